use super::{RouteAction, RouteDefinition, RouteExtractor};
use crate::metadata::normalize_name;

/// Selects controller routes whose controller lives under a namespace prefix.
///
/// Closure routes never match.
pub struct ControllerPrefixExtractor {
    prefix: String,
}

impl ControllerPrefixExtractor {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: normalize_name(prefix).to_string(),
        }
    }
}

impl RouteExtractor for ControllerPrefixExtractor {
    fn matches(&self, route: &RouteDefinition) -> bool {
        match &route.action {
            RouteAction::Method { controller, .. } => normalize_name(controller).starts_with(&self.prefix),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ClosureDescriptor;

    fn route(action: RouteAction) -> RouteDefinition {
        RouteDefinition {
            uri: "admin/users".to_string(),
            action,
            ..Default::default()
        }
    }

    #[test]
    fn test_matches_controller_namespace() {
        let extractor = ControllerPrefixExtractor::new("\\App\\Http\\Controllers\\Admin");
        let admin = route(RouteAction::Method {
            controller: "App\\Http\\Controllers\\Admin\\UserController".to_string(),
            method: "index".to_string(),
        });
        let public = route(RouteAction::Method {
            controller: "App\\Http\\Controllers\\UserController".to_string(),
            method: "index".to_string(),
        });

        assert!(extractor.matches(&admin));
        assert!(!extractor.matches(&public));
    }

    #[test]
    fn test_closures_never_match() {
        let extractor = ControllerPrefixExtractor::new("App");
        assert!(!extractor.matches(&route(RouteAction::Closure(ClosureDescriptor::default()))));
    }
}
