//! Routing labels to extraction plans
//!
//! The registry is an ordered table of routes. A label is normalized
//! (lowercased, `-` removed) and the first route whose marker occurs in it
//! wins, so more specific markers must be registered before looser ones.

use super::assembly::{Parts, Role};
use super::feeds;
use super::parser::{ParsedTree, Parser};
use super::{ExtractError, Metadata};
use crate::graph::GraphFragment;

/// Extractor over parsed content
pub type ParsedExtractor = fn(&ParsedTree, &Metadata) -> Result<GraphFragment, ExtractError>;

/// Extractor over raw (unparsed) content
pub type RawExtractor = fn(&str, &Metadata) -> Result<GraphFragment, ExtractError>;

/// Maps a part's source URL to the role it fills
pub type RoleClassifier = fn(&str) -> Option<Role>;

/// Extractor over an assembled multi-part record
pub type PartsExtractor = fn(&Parts, &Metadata) -> Result<GraphFragment, ExtractError>;

/// How a route turns content into a fragment
#[derive(Clone, Copy)]
pub enum Plan {
    /// Parse the content, then extract from the tree
    Parsed {
        parser: Parser,
        extract: ParsedExtractor,
    },
    /// Extract straight from the content
    Raw(RawExtractor),
    /// The body lists several documents; extract once every role is filled
    MultiPart {
        roles: &'static [Role],
        classify: RoleClassifier,
        assemble: PartsExtractor,
    },
}

impl Plan {
    pub fn is_multi_part(&self) -> bool {
        matches!(self, Self::MultiPart { .. })
    }

    /// Run a single-document plan over resolved content.
    ///
    /// Multi-part plans take assembled parts instead; see [`Plan::assemble`].
    pub fn extract(&self, content: &str, metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
        match self {
            Self::Parsed { parser, extract } => {
                let tree = parser.parse(content)?;
                extract(&tree, metadata)
            }
            Self::Raw(extract) => extract(content, metadata),
            Self::MultiPart { .. } => Err(ExtractError::WrongShape {
                expected: "a part list",
            }),
        }
    }

    /// Run a multi-part plan once its parts are collected.
    pub fn assemble(&self, parts: &Parts, metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
        match self {
            Self::MultiPart { assemble, .. } => assemble(parts, metadata),
            _ => Err(ExtractError::WrongShape {
                expected: "a single document",
            }),
        }
    }
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parsed { parser, .. } => f.debug_struct("Parsed").field("parser", parser).finish(),
            Self::Raw(_) => f.write_str("Raw"),
            Self::MultiPart { roles, .. } => f.debug_struct("MultiPart").field("roles", roles).finish(),
        }
    }
}

/// One row of the routing table
#[derive(Debug, Clone, Copy)]
pub struct Route {
    /// Substring looked for in the normalized label
    pub marker: &'static str,
    /// Feed name used in logs and as the `source` of emitted elements
    pub feed: &'static str,
    pub plan: Plan,
}

impl Route {
    pub fn new(marker: &'static str, feed: &'static str, plan: Plan) -> Self {
        Self { marker, feed, plan }
    }

    fn parsed(marker: &'static str, feed: &'static str, parser: Parser, extract: ParsedExtractor) -> Self {
        Self::new(marker, feed, Plan::Parsed { parser, extract })
    }
}

/// Ordered routing table
#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    routes: Vec<Route>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in feeds, in precedence order
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for route in [
            Route::parsed(".cve", "cve", Parser::Xml, feeds::cve::extract),
            Route::parsed(".nvd", "nvd", Parser::Xml, feeds::nvd::extract),
            Route::parsed(".cpe", "cpe", Parser::Xml, feeds::cpe::extract),
            Route::parsed(".maxmind", "geoip", Parser::Csv, feeds::geoip::extract),
            Route::parsed(".argus", "argus", Parser::Csv, feeds::argus::extract),
            Route::parsed(".hone", "hone", Parser::Csv, feeds::hone::extract),
            Route::parsed(".metasploit", "metasploit", Parser::Csv, feeds::metasploit::extract),
            Route::parsed(".cleanmx", "cleanmx", Parser::Xml, feeds::cleanmx::extract),
            Route::new(
                ".sophos",
                "sophos",
                Plan::MultiPart {
                    roles: feeds::sophos::ROLES,
                    classify: feeds::sophos::classify,
                    assemble: feeds::sophos::extract,
                },
            ),
            Route::new(".fsecure", "fsecure", Plan::Raw(feeds::fsecure::extract)),
            Route::parsed(
                ".malwaredomainlist",
                "malware_domains",
                Parser::Csv,
                feeds::malware_domains::extract,
            ),
            Route::new(
                ".bugtraq",
                "bugtraq",
                Plan::MultiPart {
                    roles: feeds::bugtraq::ROLES,
                    classify: feeds::bugtraq::classify,
                    assemble: feeds::bugtraq::extract,
                },
            ),
            Route::parsed(".login_events", "login_events", Parser::Csv, feeds::login_events::extract),
            Route::parsed(".installed_package", "packages", Parser::Csv, feeds::packages::extract),
            Route::parsed("situ", "situ", Parser::Xml, feeds::situ::extract),
        ] {
            registry.register(route);
        }
        registry
    }

    /// Append a route. It is consulted after every route already registered.
    pub fn register(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// First route matching the label, if any
    pub fn route(&self, label: &str) -> Option<&Route> {
        let label = normalize_label(label);
        self.routes.iter().find(|r| label.contains(r.marker))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

/// Lowercase and drop hyphens: `Stucco.Clean-MX` → `stucco.cleanmx`
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase().replace('-', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(label: &str) -> Option<&'static str> {
        ExtractorRegistry::standard().route(label).map(|r| r.feed)
    }

    #[test]
    fn labels_route_by_marker() {
        assert_eq!(feed("stucco.in.structured.cve"), Some("cve"));
        assert_eq!(feed("stucco.in.structured.nvd"), Some("nvd"));
        assert_eq!(feed("stucco.in.structured.maxmind"), Some("geoip"));
        assert_eq!(feed("stucco.in.structured.hone"), Some("hone"));
        assert_eq!(feed("stucco.in.unstructured.sophos"), Some("sophos"));
        assert_eq!(feed("stucco.in.structured.installed_package"), Some("packages"));
        assert_eq!(feed("stucco.in.structured.situ"), Some("situ"));
    }

    #[test]
    fn labels_are_normalized() {
        assert_eq!(feed("Stucco.In.Clean-MX"), Some("cleanmx"));
        assert_eq!(feed("stucco.in.f-secure"), Some("fsecure"));
        assert_eq!(feed("STUCCO.IN.LOGIN_EVENTS"), Some("login_events"));
    }

    #[test]
    fn unknown_label_has_no_route() {
        assert_eq!(feed("stucco.in.structured.twitter"), None);
        // Markers carry their leading dot
        assert_eq!(feed("cvefeed"), None);
    }

    #[test]
    fn first_matching_route_wins() {
        // Contains both ".cve" and "situ"
        assert_eq!(feed("situ.cve"), Some("cve"));
        assert_eq!(feed("stucco.situ.events"), Some("situ"));
    }

    #[test]
    fn registered_routes_extend_the_table() {
        fn none(_: &str, _: &Metadata) -> Result<GraphFragment, ExtractError> {
            Ok(GraphFragment::new())
        }

        let mut registry = ExtractorRegistry::standard();
        registry.register(Route::new(".custom", "custom", Plan::Raw(none)));
        assert_eq!(registry.route("x.custom").map(|r| r.feed), Some("custom"));
        assert_eq!(registry.routes().len(), 16);
    }

    #[test]
    fn multi_part_routes_declare_roles() {
        let registry = ExtractorRegistry::standard();
        let bugtraq = registry.route("x.bugtraq").unwrap();
        assert!(bugtraq.plan.is_multi_part());
        match bugtraq.plan {
            Plan::MultiPart { roles, .. } => assert_eq!(roles.len(), 5),
            _ => unreachable!(),
        }
    }
}
