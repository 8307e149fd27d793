use super::{RouteDefinition, RouteExtractor};

/// Selects routes whose URI (or declared group prefix) starts with a value.
pub struct UriPrefixExtractor {
    prefix: String,
}

impl UriPrefixExtractor {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_start_matches('/').to_string(),
        }
    }
}

impl RouteExtractor for UriPrefixExtractor {
    fn matches(&self, route: &RouteDefinition) -> bool {
        let subject = route.prefix.as_deref().unwrap_or(&route.uri);
        subject.trim_start_matches('/').starts_with(&self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(uri: &str, prefix: Option<&str>) -> RouteDefinition {
        RouteDefinition {
            uri: uri.to_string(),
            prefix: prefix.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_matches_uri() {
        let extractor = UriPrefixExtractor::new("/api");
        assert!(extractor.matches(&route("api/users", None)));
        assert!(extractor.matches(&route("/api/users", None)));
        assert!(!extractor.matches(&route("web/users", None)));
    }

    #[test]
    fn test_declared_prefix_takes_precedence() {
        let extractor = UriPrefixExtractor::new("api/v2");
        assert!(extractor.matches(&route("api/v2/users", Some("api/v2"))));
        assert!(!extractor.matches(&route("api/v2/users", Some("api"))));
    }
}
