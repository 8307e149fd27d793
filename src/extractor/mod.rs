//! Route table access and route-prefix group selection.
//!
//! Routes come from the project manifest, already enumerated by the host
//! framework. A configured group selects its routes with one of the
//! [`RouteExtractor`] implementations.
//!
//! # Supported Match Kinds
//!
//! - **URI prefix**: See [`uri::UriPrefixExtractor`]
//! - **Controller namespace**: See [`controller::ControllerPrefixExtractor`]

pub mod controller;
pub mod uri;

use crate::config::{GeneratorConfig, MatchKind, RoutePrefixGroup};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait for selecting the routes of one output target.
pub trait RouteExtractor {
    /// Whether `route` belongs to this target.
    fn matches(&self, route: &RouteDefinition) -> bool;

    /// Selects the matching routes, dropping the ones named in the ignore list.
    fn extract_routes<'r>(
        &self,
        routes: &'r [RouteDefinition],
        config: &GeneratorConfig,
    ) -> Vec<&'r RouteDefinition> {
        routes
            .iter()
            .filter(|route| {
                if let Some(name) = &route.name {
                    if config.is_ignored_route_name(name) {
                        debug!("Skipping ignored route {}", name);
                        return false;
                    }
                }
                self.matches(route)
            })
            .collect()
    }
}

/// Builds the extractor for a configured group.
pub fn extractor_for(group: &RoutePrefixGroup) -> Box<dyn RouteExtractor> {
    match group.match_kind {
        MatchKind::Uri => Box::new(uri::UriPrefixExtractor::new(&group.value)),
        MatchKind::Controller => Box::new(controller::ControllerPrefixExtractor::new(&group.value)),
    }
}

/// One entry of the application's route table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteDefinition {
    /// The URI pattern (e.g., "api/users/{user}")
    pub uri: String,
    /// HTTP methods the route answers
    pub methods: Vec<String>,
    /// Router-assigned name (e.g., "api.users.show")
    pub name: Option<String>,
    /// Group prefix the route was declared under
    pub prefix: Option<String>,
    pub middleware: Vec<String>,
    /// Path parameter names, when the router exported them
    pub path_params: Option<Vec<String>>,
    pub action: RouteAction,
}

/// What a route dispatches to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteAction {
    /// `Controller@method`
    Method { controller: String, method: String },
    Closure(ClosureDescriptor),
    /// Anything else the router can dispatch to
    #[default]
    #[serde(other)]
    Unknown,
}

/// Reflection data of a closure handler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosureDescriptor {
    pub params: Vec<crate::metadata::ParamDescriptor>,
    pub return_type: Option<String>,
    pub doc: Option<String>,
    /// Namespace the closure was declared in
    pub namespace: Option<String>,
    pub imports: indexmap::IndexMap<String, String>,
}

/// HTTP methods a route can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "OPTIONS" => Some(HttpMethod::Options),
            "HEAD" => Some(HttpMethod::Head),
            _ => None,
        }
    }

    /// Lowercase name, as used for OpenAPI path item keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
        }
    }

    /// Methods whose input travels in the request body.
    pub fn is_mutating(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_ascii_uppercase())
    }
}

impl RouteDefinition {
    /// Path parameter names, from the router export or the `{name}` segments.
    pub fn parameter_names(&self) -> Vec<String> {
        if let Some(names) = &self.path_params {
            return names.clone();
        }
        let mut names = Vec::new();
        let mut rest = self.uri.as_str();
        while let Some(start) = rest.find('{') {
            let Some(end) = rest[start..].find('}') else {
                break;
            };
            let name = rest[start + 1..start + end].trim_end_matches('?');
            names.push(name.to_string());
            rest = &rest[start + end + 1..];
        }
        names
    }

    /// The URI as an OpenAPI path: leading slash, optional markers dropped.
    pub fn openapi_path(&self) -> String {
        format!("/{}", self.uri.trim_start_matches('/').replace("?}", "}"))
    }

    /// Route label for diagnostics
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", self.uri, name),
            None => self.uri.clone(),
        }
    }

    /// Whether an authentication middleware guards this route.
    pub fn requires_auth(&self) -> bool {
        self.middleware
            .iter()
            .any(|middleware| middleware == "auth" || middleware.starts_with("auth:"))
    }
}
