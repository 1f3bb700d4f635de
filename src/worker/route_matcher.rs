//! Route matching logic.
//!
//! # Responsibilities
//! - Parse a route path template into literal and wildcard segments
//! - Match a request path against a template
//! - Filter by HTTP method
//!
//! # Design Decisions
//! - Paths are split on '/' with empty segments discarded, so leading and
//!   trailing slashes never affect matching
//! - Segment counts must be equal; there is no catch-all segment
//! - A segment starting with ':' matches any single segment
//! - Method matching is case-insensitive, path matching is case-sensitive
//! - Empty method set = any method

use std::collections::BTreeSet;
use std::fmt;

use crate::triggers::HttpTrigger;

/// Marker prefix of a wildcard template segment.
pub const WILDCARD_MARKER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("invalid http method {0:?}")]
    InvalidMethod(String),
    #[error("route path is required")]
    MissingPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Named wildcard, name stored without the marker.
    Wildcard(String),
}

impl Segment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == segment,
            Segment::Wildcard(_) => true,
        }
    }
}

/// Split on '/' discarding empty segments.
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// A parsed route path such as `/users/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Self {
        let segments = split_path(template)
            .map(|segment| match segment.strip_prefix(WILDCARD_MARKER) {
                Some(name) => Segment::Wildcard(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// Returns true if `path` has as many segments as the template and
    /// every literal segment is equal.
    pub fn matches(&self, path: &str) -> bool {
        let mut requested = split_path(path);
        for segment in &self.segments {
            match requested.next() {
                Some(value) if segment.matches(value) => {}
                _ => return false,
            }
        }
        requested.next().is_none()
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => write!(f, "/{}", literal)?,
                Segment::Wildcard(name) => write!(f, "/{}{}", WILDCARD_MARKER, name)?,
            }
        }
        Ok(())
    }
}

/// Static metadata of a route worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    /// Upper-cased methods. Empty = any.
    methods: BTreeSet<String>,
    path: PathTemplate,
}

impl RouteDescriptor {
    pub fn new<I, M>(methods: I, path: &str) -> Result<Self, DescriptorError>
    where
        I: IntoIterator<Item = M>,
        M: AsRef<str>,
    {
        let methods = methods
            .into_iter()
            .map(|method| normalize_method(method.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self {
            methods,
            path: PathTemplate::parse(path),
        })
    }

    /// Route accepting any method.
    pub fn any_method(path: &str) -> Self {
        Self {
            methods: BTreeSet::new(),
            path: PathTemplate::parse(path),
        }
    }

    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    pub fn path(&self) -> &PathTemplate {
        &self.path
    }

    pub fn matches_method(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.contains(&method.to_ascii_uppercase())
    }

    /// Method AND path.
    pub fn matches(&self, trigger: &HttpTrigger) -> bool {
        self.matches_method(trigger.method()) && self.path.matches(trigger.path())
    }
}

impl fmt::Display for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.methods.is_empty() {
            write!(f, "* {}", self.path)
        } else {
            let methods: Vec<&str> = self.methods.iter().map(String::as_str).collect();
            write!(f, "{} {}", methods.join(","), self.path)
        }
    }
}

/// Methods are HTTP tokens; anything else is rejected at registration.
fn normalize_method(method: &str) -> Result<String, DescriptorError> {
    let method = method.trim();
    let is_token = !method.is_empty()
        && method
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if is_token {
        Ok(method.to_ascii_uppercase())
    } else {
        Err(DescriptorError::InvalidMethod(method.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_path_matching() {
        let template = PathTemplate::parse("/users/:id");

        assert!(template.matches("/users/42"));
        assert!(template.matches("/users/42/"));
        assert!(template.matches("users/42"));
        assert!(!template.matches("/users")); // segment count mismatch
        assert!(!template.matches("/users/42/extra"));
        assert!(!template.matches("/accounts/42"));
    }

    #[test]
    fn test_literal_segments_case_sensitive() {
        let template = PathTemplate::parse("/Items");
        assert!(template.matches("/Items"));
        assert!(!template.matches("/items"));
    }

    #[test]
    fn test_root_template() {
        let template = PathTemplate::parse("/");
        assert!(template.matches("/"));
        assert!(template.matches(""));
        assert!(!template.matches("/anything"));
    }

    #[test]
    fn test_method_filtering() {
        let route = RouteDescriptor::new(["GET"], "/items/:id").unwrap();

        assert!(route.matches(&HttpTrigger::new("GET", "/items/7")));
        assert!(route.matches(&HttpTrigger::new("get", "/items/7")));
        assert!(!route.matches(&HttpTrigger::new("POST", "/items/7")));
    }

    #[test]
    fn test_empty_methods_match_any() {
        let route = RouteDescriptor::any_method("/items");
        assert!(route.matches(&HttpTrigger::new("DELETE", "/items")));
        assert!(route.matches(&HttpTrigger::new("PATCH", "/items/")));
    }

    #[test]
    fn test_multiple_methods() {
        // Any listed method is accepted
        let route = RouteDescriptor::new(["GET", "post"], "/items").unwrap();
        assert!(route.matches(&HttpTrigger::new("GET", "/items")));
        assert!(route.matches(&HttpTrigger::new("POST", "/items")));
        assert!(!route.matches(&HttpTrigger::new("PUT", "/items")));
    }

    #[test]
    fn test_invalid_method_rejected() {
        assert_eq!(
            RouteDescriptor::new(["GE T"], "/").unwrap_err(),
            DescriptorError::InvalidMethod("GE T".into())
        );
        assert!(RouteDescriptor::new([""], "/").is_err());
    }

    #[test]
    fn test_display() {
        let route = RouteDescriptor::new(["post", "GET"], "items//:id/").unwrap();
        assert_eq!(route.to_string(), "GET,POST /items/:id");
        assert_eq!(RouteDescriptor::any_method("").to_string(), "* /");
    }
}
