//! Parsers turning resolved content into a tree the extractors walk
//!
//! Two formats are understood:
//! - XML, parsed into an owned element tree with namespace prefixes dropped
//! - delimited text, parsed into a table of trimmed cells

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while parsing content
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("unbalanced XML: {0}")]
    Unbalanced(String),

    #[error("document has no root element")]
    Empty,

    #[error("malformed delimited text: {0}")]
    Csv(#[from] csv::Error),
}

/// Which parser a route feeds its content through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parser {
    Xml,
    Csv,
}

impl Parser {
    pub fn parse(&self, content: &str) -> Result<ParsedTree, ParseError> {
        match self {
            Self::Xml => parse_xml(content).map(ParsedTree::Document),
            Self::Csv => parse_delimited(content).map(ParsedTree::Table),
        }
    }
}

/// Parser output
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTree {
    Document(XmlElement),
    Table(Table),
}

/// An XML element with its attributes, text and children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Local name (no namespace prefix)
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlElement>,
    /// Concatenated text and CDATA directly inside this element
    pub text: String,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn open(start: &BytesStart<'_>) -> Result<Self, ParseError> {
        let mut element = Self::new(String::from_utf8_lossy(start.local_name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::Xml(e.to_string()))?
                .into_owned();
            element.attributes.insert(key, value);
        }
        Ok(element)
    }

    /// Trimmed text content
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Non-empty trimmed text of the first direct child with the given name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(XmlElement::text).filter(|t| !t.is_empty())
    }

    /// All elements with the given name below this one, in document order.
    /// Matches are not searched for nested matches.
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            } else {
                child.collect_descendants(name, found);
            }
        }
    }

    /// First element with the given name at any depth below this one
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find_map(|c| {
            if c.name == name {
                Some(c)
            } else {
                c.find(name)
            }
        })
    }
}

/// Rows of delimited text, header included when the source has one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    /// Rows, minus a leading header row whose first cell is `header`
    /// (compared case-insensitively).
    pub fn records(&self, header: &str) -> &[Row] {
        match self.rows.first() {
            Some(first) if first.get(0).is_some_and(|c| c.eq_ignore_ascii_case(header)) => {
                &self.rows[1..]
            }
            _ => &self.rows,
        }
    }
}

/// One delimited row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub cells: Vec<String>,
}

impl Row {
    /// Cell text at `index`, or `None` when absent or empty
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells
            .get(index)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

fn parse_xml(content: &str) -> Result<XmlElement, ParseError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(XmlElement::open(&start)?),
            Ok(Event::Empty(start)) => {
                let element = XmlElement::open(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(end)) => {
                let element = stack.pop().ok_or_else(|| {
                    ParseError::Unbalanced(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(end.local_name().as_ref())
                    ))
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e.to_string())),
            // Declarations, comments, processing instructions, doctype
            Ok(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Unbalanced(format!("<{}> is never closed", open.name)));
    }
    root.ok_or(ParseError::Empty)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(ParseError::Unbalanced(format!(
                "second root element <{}>",
                element.name
            )))
        }
    }
    Ok(())
}

fn parse_delimited(content: &str) -> Result<Table, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(Row {
            cells: record.iter().map(str::to_string).collect(),
        });
    }
    Ok(Table { rows })
}
