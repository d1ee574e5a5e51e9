//! Text helpers for feeds that publish HTML pages

use regex_lite::Regex;
use std::sync::OnceLock;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("literal regex"))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn strip_tags(html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    decode_entities(&regex(&TAG, r"<[^>]*>").replace_all(html, ""))
}

/// Page heading: the first `<h1>`, else `<title>`
pub fn heading(html: &str) -> Option<String> {
    static H1: OnceLock<Regex> = OnceLock::new();
    static TITLE: OnceLock<Regex> = OnceLock::new();

    [regex(&H1, r"(?is)<h1[^>]*>(.*?)</h1>"), regex(&TITLE, r"(?is)<title[^>]*>(.*?)</title>")]
        .iter()
        .find_map(|re| {
            let inner = re.captures(html)?.get(1)?.as_str();
            let text = collapse(&strip_tags(inner));
            (!text.is_empty()).then_some(text)
        })
}

/// Visible text, one block element per line, whitespace collapsed
pub fn plain_text(html: &str) -> String {
    static HIDDEN: OnceLock<Regex> = OnceLock::new();
    static BREAK: OnceLock<Regex> = OnceLock::new();

    let visible = regex(&HIDDEN, r"(?is)<(script|style)[^>]*>.*?</(script|style)>").replace_all(html, "");
    let broken = regex(&BREAK, r"(?i)<br\s*/?>|</(p|div|li|tr|td|th|dt|dd|h[1-6])>").replace_all(&visible, "\n");

    strip_tags(&broken)
        .lines()
        .map(collapse)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Link targets, in page order, without duplicates
pub fn links(html: &str) -> Vec<String> {
    static HREF: OnceLock<Regex> = OnceLock::new();

    let mut found: Vec<String> = Vec::new();
    for caps in regex(&HREF, r#"(?i)href\s*=\s*["']([^"']+)["']"#).captures_iter(html) {
        let link = decode_entities(&caps[1]);
        if !found.contains(&link) {
            found.push(link);
        }
    }
    found
}

/// Value of a `Label: value` line in plain text. When the label stands
/// alone on its line, the next line is the value.
pub fn field(text: &str, label: &str) -> Option<String> {
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(rest) = strip_label(line, label) else {
            continue;
        };
        let value = if rest.is_empty() {
            lines.next().map(str::trim).unwrap_or_default()
        } else {
            rest
        };
        return (!value.is_empty()).then(|| value.to_string());
    }
    None
}

/// Lines after the line labelled `start`, up to the line labelled `end`
pub fn section(text: &str, start: &str, end: &str) -> Vec<String> {
    let mut lines = text.lines().skip_while(|l| strip_label(l, start).is_none());
    let Some(first) = lines.next() else {
        return Vec::new();
    };

    let mut items = Vec::new();
    if let Some(rest) = strip_label(first, start).filter(|r| !r.is_empty()) {
        items.push(rest.to_string());
    }
    items.extend(
        lines
            .take_while(|l| strip_label(l, end).is_none())
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
    );
    items
}

/// Text of `line` after `label` and an optional colon, if the line starts
/// with the label (case-insensitive)
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim();
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = line[label.len()..].trim_start();
    match rest.strip_prefix(':') {
        Some(value) => Some(value.trim()),
        None if rest.is_empty() => Some(rest),
        // Label is only a prefix of a longer word
        None => None,
    }
}

/// Dotted-quad IPv4 addresses, in order, without duplicates
pub fn ipv4_addresses(text: &str) -> Vec<String> {
    static IPV4: OnceLock<Regex> = OnceLock::new();
    unique(regex(&IPV4, r"\b(?:\d{1,3}\.){3}\d{1,3}\b").find_iter(text).map(|m| m.as_str()))
}

/// MD5 digests, lowercased, in order, without duplicates
pub fn md5_digests(text: &str) -> Vec<String> {
    static MD5: OnceLock<Regex> = OnceLock::new();
    let lowered: Vec<String> = regex(&MD5, r"\b[0-9a-fA-F]{32}\b")
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect();
    unique(lowered.iter().map(String::as_str))
}

fn unique<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for item in items {
        if !found.iter().any(|f| f == item) {
            found.push(item.to_string());
        }
    }
    found
}
