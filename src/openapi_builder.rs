use crate::config::{GeneratorConfig, RoutePrefixGroup};
use crate::error::{Error, Result};
use crate::extractor::{extractor_for, HttpMethod, RouteDefinition};
use crate::metadata::MetadataProvider;
use crate::operation;
use crate::schema::SchemaNode;
use crate::schema_generator::SchemaGenerator;
use indexmap::{IndexMap, IndexSet};
use log::{debug, error, info, warn};
use serde::Serialize;

pub const JSON_CONTENT: &str = "application/json";
pub const FORM_CONTENT: &str = "application/x-www-form-urlencoded";

/// Finished generation result handed to writers
#[derive(Debug, Clone, Default, Serialize)]
pub struct Spec {
    /// OpenAPI path -> lowercase method -> operation
    pub paths: IndexMap<String, IndexMap<String, Operation>>,
    pub components: Components,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, Serialize)]
pub struct Components {
    /// Schema definitions
    pub schemas: IndexMap<String, SchemaNode>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, Serialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, Serialize)]
pub struct OpenApiDocument<'s> {
    /// OpenAPI version
    pub openapi: String,
    /// API info
    pub info: Info,
    /// API paths
    pub paths: &'s IndexMap<String, IndexMap<String, Operation>>,
    /// Components (schemas, etc.)
    pub components: &'s Components,
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct Operation {
    /// Operation ID
    #[serde(rename = "operationId")]
    pub operation_id: String,
    /// Operation summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Operation description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Parameters (path, query)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Request body
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses by status code
    pub responses: IndexMap<String, Response>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter location (path, query)
    #[serde(rename = "in")]
    pub location: String,
    /// Whether the parameter is required
    pub required: bool,
    /// Parameter schema
    pub schema: SchemaNode,
    /// Parameter description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, Serialize)]
pub struct RequestBody {
    /// Whether the request body is required
    pub required: bool,
    /// Content types and their schemas
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, Serialize)]
pub struct MediaType {
    /// Schema for this media type
    pub schema: SchemaNode,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub examples: IndexMap<String, Example>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Example {
    pub value: serde_json::Value,
}

/// OpenAPI Response object
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// Response description
    pub description: String,
    /// Response content
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

impl MediaType {
    pub fn of(schema: SchemaNode) -> Self {
        Self {
            schema,
            examples: IndexMap::new(),
        }
    }
}

impl Example {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }
}

impl Response {
    /// A response without body
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            content: IndexMap::new(),
        }
    }

    /// A JSON response
    pub fn with_content(description: &str, media: MediaType) -> Self {
        let mut response = Self::new(description);
        response.content.insert(JSON_CONTENT.to_string(), media);
        response
    }
}

impl Operation {
    /// Every schema the operation embeds.
    pub fn schemas(&self) -> impl Iterator<Item = &SchemaNode> {
        let parameters = self.parameters.iter().map(|parameter| &parameter.schema);
        let body = self
            .request_body
            .iter()
            .flat_map(|body| body.content.values().map(|media| &media.schema));
        let responses = self
            .responses
            .values()
            .flat_map(|response| response.content.values().map(|media| &media.schema));
        parameters.chain(body).chain(responses)
    }
}

impl Spec {
    /// Every operation, with its path and method
    pub fn operations(&self) -> impl Iterator<Item = (&str, &str, &Operation)> {
        self.paths.iter().flat_map(|(path, methods)| {
            methods
                .iter()
                .map(move |(method, operation)| (path.as_str(), method.as_str(), operation))
        })
    }

    /// Names referenced anywhere without a registered component.
    pub fn dangling_references(&self) -> Vec<String> {
        let mut referenced = IndexSet::new();
        for (_, _, operation) in self.operations() {
            for schema in operation.schemas() {
                schema.collect_references(&mut referenced);
            }
        }
        for schema in self.components.schemas.values() {
            schema.collect_references(&mut referenced);
        }
        referenced
            .into_iter()
            .filter(|name| !self.components.schemas.contains_key(name))
            .collect()
    }
}

/// Assembles the operations of one output target
pub struct OpenApiBuilder<'c> {
    config: &'c GeneratorConfig,
    /// Paths collection (URL path -> method -> Operation)
    paths: IndexMap<String, IndexMap<String, Operation>>,
}

impl<'c> OpenApiBuilder<'c> {
    pub fn new(config: &'c GeneratorConfig) -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            config,
            paths: IndexMap::new(),
        }
    }

    /// Adds one operation per HTTP method the route answers.
    ///
    /// # Arguments
    ///
    /// * `route` - Route to document; ignored methods are skipped
    /// * `gen` - Generation context shared by every route of the target
    pub fn add_route(&mut self, route: &RouteDefinition, gen: &mut SchemaGenerator<'_>) -> Result<()> {
        for name in &route.methods {
            let Some(method) = HttpMethod::parse(name) else {
                warn!("Unsupported HTTP method {} on {}, skipping", name, route.label());
                continue;
            };
            if self.config.is_ignored_method(method.as_str()) {
                continue;
            }
            debug!("Discovered route: {} {}", method, route.uri);

            let operation = operation::build_operation(gen, route, method, self.config).inspect_err(|err| {
                error!("Failed to document {} {}: {}", method, route.label(), err);
            })?;
            self.paths
                .entry(route.openapi_path())
                .or_default()
                .insert(method.as_str().to_string(), operation);
        }
        Ok(())
    }

    /// Resolves every pending component and builds the spec.
    pub fn build(self, gen: SchemaGenerator<'_>) -> Result<Spec> {
        debug!("Building final spec");
        let spec = Spec {
            paths: self.paths,
            components: Components {
                schemas: gen.finish()?,
            },
        };
        if let Some(name) = spec.dangling_references().into_iter().next() {
            return Err(Error::DanglingReference { name });
        }
        Ok(spec)
    }
}

/// Generates the spec of one route-prefix group. Every call works on its own
/// component registry.
///
/// # Arguments
///
/// * `provider` - Class, method and table metadata
/// * `routes` - Every route of the application; the group selects its own
/// * `group` - Output target to document
/// * `config` - Generator configuration
///
/// # Returns
///
/// The spec with every referenced component resolved, or the first error of
/// any selected route
pub fn generate_spec(
    provider: &dyn MetadataProvider,
    routes: &[RouteDefinition],
    group: &RoutePrefixGroup,
    config: &GeneratorConfig,
) -> Result<Spec> {
    let extractor = extractor_for(group);
    let selected = extractor.extract_routes(routes, config);
    info!("Documenting {} routes for {}", selected.len(), group.output);

    let mut gen = SchemaGenerator::new(provider, &config.known_types);
    let mut builder = OpenApiBuilder::new(config);
    for route in selected {
        builder.add_route(route, &mut gen)?;
    }
    let spec = builder.build(gen)?;
    info!(
        "Generated {} paths and {} components",
        spec.paths.len(),
        spec.components.schemas.len()
    );
    Ok(spec)
}
