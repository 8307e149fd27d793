//! Operation construction for one (route, method) pair.
//!
//! [`OperationBuilder`] walks a fixed sequence of states, each filling one part
//! of the [`Operation`]:
//!
//! ```text
//! CollectMetadata -> ResolveParameters -> ResolveRequestBody
//!     -> ResolveReturnType -> AttachStandardResponses -> Done
//! ```
//!
//! Any error aborts the operation; there is no partial result.

use crate::class_resolver;
use crate::config::GeneratorConfig;
use crate::docblock::{DocBlock, TypeDescriptor};
use crate::error::{Error, Result};
use crate::extractor::{HttpMethod, RouteAction, RouteDefinition};
use crate::metadata::{normalize_name, short_name, ClassDescriptor, ParamDescriptor};
use crate::openapi_builder::{
    Example, MediaType, Operation, Parameter, RequestBody, Response, FORM_CONTENT, JSON_CONTENT,
};
use crate::resource::{backing_entity, wrap_data};
use crate::schema::{merge_schemas, ObjectNode, SchemaNode};
use crate::schema_generator::SchemaGenerator;
use crate::type_resolver::Scope;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::json;

/// Build progress of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    CollectMetadata,
    ResolveParameters,
    ResolveRequestBody,
    ResolveReturnType,
    AttachStandardResponses,
    Done,
}

/// The callable a route dispatches to
struct Handler<'a> {
    class: Option<&'a ClassDescriptor>,
    /// Method name, or `closure`
    name: String,
    params: &'a [ParamDescriptor],
    return_type: Option<&'a str>,
    doc: DocBlock,
    scope: Scope,
    /// Diagnostic label, `Class::method` or `closure <route>`
    site: String,
}

impl<'a> Handler<'a> {
    fn resolve<'p: 'a>(gen: &SchemaGenerator<'p>, route: &'a RouteDefinition) -> Result<Self> {
        match &route.action {
            RouteAction::Method { controller, method } => {
                let class = gen
                    .provider()
                    .class(controller)
                    .ok_or_else(|| Error::UnlocatableClass {
                        name: controller.clone(),
                        context: route.label(),
                    })?;
                let descriptor = gen.find_method(class, method).ok_or_else(|| Error::UnknownHandler {
                    route: format!("{} ({}::{} does not exist)", route.label(), class.name, method),
                })?;
                Ok(Handler {
                    class: Some(class),
                    name: descriptor.name.clone(),
                    params: &descriptor.params,
                    return_type: descriptor.return_type.as_deref(),
                    doc: gen.provider().documentation(descriptor.doc.as_deref()),
                    scope: Scope::of_class(class),
                    site: format!("{}::{}", class.name, descriptor.name),
                })
            }
            RouteAction::Closure(closure) => Ok(Handler {
                class: None,
                name: "closure".to_string(),
                params: &closure.params,
                return_type: closure.return_type.as_deref(),
                doc: gen.provider().documentation(closure.doc.as_deref()),
                scope: Scope {
                    namespace: closure.namespace.as_deref().map(normalize_name).unwrap_or("").to_string(),
                    imports: closure.imports.clone(),
                    owner: None,
                },
                site: format!("closure {}", route.label()),
            }),
            RouteAction::Unknown => Err(Error::UnknownHandler { route: route.label() }),
        }
    }
}

/// Builds the operation of `route` answering `method`.
///
/// # Arguments
///
/// * `gen` - Generation context; components met on the way are registered in it
/// * `route` - Route whose handler is documented
/// * `method` - HTTP method the operation answers
/// * `config` - Ignore lists and known framework types
///
/// # Returns
///
/// The finished operation, or the first fatal analysis error
/// (`UnknownHandler`, `UnknownType`, `UnlocatableClass`, ...)
pub fn build_operation(
    gen: &mut SchemaGenerator<'_>,
    route: &RouteDefinition,
    method: HttpMethod,
    config: &GeneratorConfig,
) -> Result<Operation> {
    OperationBuilder::new(gen, route, method, config)?.run(gen)
}

/// State machine producing one [`Operation`]
pub struct OperationBuilder<'a> {
    route: &'a RouteDefinition,
    method: HttpMethod,
    config: &'a GeneratorConfig,
    handler: Handler<'a>,
    state: BuildState,
    /// Fields of the validated/raw request inputs, merged
    input: ObjectNode,
    response_schema: Option<SchemaNode>,
    operation: Operation,
}

impl<'a> OperationBuilder<'a> {
    pub fn new<'p: 'a>(
        gen: &SchemaGenerator<'p>,
        route: &'a RouteDefinition,
        method: HttpMethod,
        config: &'a GeneratorConfig,
    ) -> Result<Self> {
        let handler = Handler::resolve(gen, route)?;
        Ok(Self {
            route,
            method,
            config,
            handler,
            state: BuildState::CollectMetadata,
            input: ObjectNode::new(),
            response_schema: None,
            operation: Operation::default(),
        })
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Runs every remaining state and hands out the finished operation.
    pub fn run(mut self, gen: &mut SchemaGenerator<'_>) -> Result<Operation> {
        while self.state != BuildState::Done {
            self.step(gen)?;
        }
        Ok(self.operation)
    }

    /// Runs the current state and advances to the next one.
    pub fn step(&mut self, gen: &mut SchemaGenerator<'_>) -> Result<BuildState> {
        self.state = match self.state {
            BuildState::CollectMetadata => {
                self.collect_metadata();
                BuildState::ResolveParameters
            }
            BuildState::ResolveParameters => {
                self.resolve_parameters(gen)?;
                BuildState::ResolveRequestBody
            }
            BuildState::ResolveRequestBody => {
                self.resolve_request_body();
                BuildState::ResolveReturnType
            }
            BuildState::ResolveReturnType => {
                self.resolve_return_type(gen)?;
                BuildState::AttachStandardResponses
            }
            BuildState::AttachStandardResponses => {
                self.attach_standard_responses(gen);
                BuildState::Done
            }
            BuildState::Done => BuildState::Done,
        };
        Ok(self.state)
    }

    fn collect_metadata(&mut self) {
        let class_doc = self.handler.class.map(ClassDescriptor::doc_block).unwrap_or_default();
        let doc = &self.handler.doc;

        self.operation.operation_id = operation_id(self.route, &self.handler, &class_doc);
        self.operation.tags = class_doc.tag_names();
        self.operation.tags.extend(doc.tag_names());
        self.operation.summary = doc.summary.clone();
        self.operation.description = doc.description.clone();
        debug!("Operation {} for {} {}", self.operation.operation_id, self.method, self.route.uri);
    }

    fn resolve_parameters(&mut self, gen: &mut SchemaGenerator<'_>) -> Result<()> {
        for name in self.route.parameter_names() {
            let description = self.handler.doc.param(&name).and_then(|tag| tag.description);
            self.operation.parameters.push(Parameter {
                name,
                location: "path".to_string(),
                required: true,
                schema: SchemaNode::string(),
                description,
            });
        }

        for param in self.handler.params {
            if let Some(fields) = self.input_fields(gen, param)? {
                self.input.merge(fields);
            }
        }

        if !self.method.is_mutating() {
            for (name, schema) in &self.input.properties {
                self.operation.parameters.push(Parameter {
                    name: name.clone(),
                    location: "query".to_string(),
                    required: true,
                    schema: schema.clone(),
                    description: None,
                });
            }
        }
        debug!("Recorded {} parameters for {}", self.operation.parameters.len(), self.handler.site);
        Ok(())
    }

    /// Request fields contributed by one handler parameter, if its type is a
    /// validated input or the raw request.
    fn input_fields(&self, gen: &mut SchemaGenerator<'_>, param: &ParamDescriptor) -> Result<Option<ObjectNode>> {
        let Some(text) = param.ty.as_deref() else {
            return Ok(None);
        };
        let site = format!("{}(${})", self.handler.site, param.name);
        let ty = TypeDescriptor::parse(text).map_err(|_| Error::unknown_type(&site, text))?;
        let known = gen.known();

        for member in ty.members().0 {
            let Some(name) = member.base_name() else {
                continue;
            };
            let fq = match gen.types.resolve_class_name(name, &self.handler.scope, &site) {
                Ok(fq) => fq,
                Err(_) => {
                    debug!("Parameter ${} of {} is not a request input, skipping", param.name, self.handler.site);
                    continue;
                }
            };
            if gen.types.is_kind_of_any(&fq, &known.validated_input) {
                return validated_input_fields(gen, &fq).map(Some);
            }
            if gen.types.is_kind_of_any(&fq, &known.request) {
                return self.request_shape_fields(gen, param, &site);
            }
        }
        Ok(None)
    }

    /// Fields of a raw request, from a `@param array{...} $request` style annotation.
    fn request_shape_fields(
        &self,
        gen: &mut SchemaGenerator<'_>,
        param: &ParamDescriptor,
        site: &str,
    ) -> Result<Option<ObjectNode>> {
        let Some(text) = self.handler.doc.param(&param.name).and_then(|tag| tag.ty) else {
            return Ok(None);
        };
        let ty = TypeDescriptor::parse(&text).map_err(|_| Error::unknown_type(site, &text))?;
        let shape = match ty {
            shape @ TypeDescriptor::Shape(_) => shape,
            TypeDescriptor::Generic { mut args, .. } => match args.pop() {
                Some(shape @ TypeDescriptor::Shape(_)) => shape,
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };
        match gen.classify(&shape, &self.handler.scope, site)? {
            SchemaNode::Object(object) => Ok(Some(object)),
            _ => Ok(None),
        }
    }

    fn resolve_request_body(&mut self) {
        if !self.method.is_mutating() || self.input.properties.is_empty() {
            return;
        }
        let schema = self.input.clone().into_node();
        let mut content = IndexMap::new();
        if !schema.contains_binary() {
            content.insert(JSON_CONTENT.to_string(), MediaType::of(schema.clone()));
        }
        content.insert(FORM_CONTENT.to_string(), MediaType::of(schema));
        self.operation.request_body = Some(RequestBody {
            required: true,
            content,
        });
    }

    fn resolve_return_type(&mut self, gen: &mut SchemaGenerator<'_>) -> Result<()> {
        let site = self.handler.site.clone();
        let mut returns = ReturnSchemas::default();

        let Some(text) = self.handler.return_type else {
            returns.documented(gen, &self.handler, &site, false)?;
            self.response_schema = merge_schemas(returns.schemas, false);
            return Ok(());
        };

        let ty = TypeDescriptor::parse(text).map_err(|_| Error::unknown_type(&site, text))?;
        let (members, nullable) = ty.members();
        for member in members {
            self.return_member(gen, member, &mut returns, &site)?;
        }
        debug!("Collected {} return schemas for {}", returns.schemas.len(), site);
        self.response_schema = merge_schemas(returns.schemas, nullable);
        Ok(())
    }

    fn return_member(
        &self,
        gen: &mut SchemaGenerator<'_>,
        member: &TypeDescriptor,
        returns: &mut ReturnSchemas,
        site: &str,
    ) -> Result<()> {
        let known = gen.known();
        let name = match member {
            TypeDescriptor::Named(name) => name.as_str(),
            other => {
                returns.schemas.push(gen.classify(other, &self.handler.scope, site)?);
                return Ok(());
            }
        };

        match name.to_ascii_lowercase().as_str() {
            "void" | "never" | "null" => return Ok(()),
            "array" | "iterable" => {
                if returns.documented(gen, &self.handler, site, false)? == 0 {
                    returns.schemas.push(gen.classify(member, &self.handler.scope, site)?);
                }
                return Ok(());
            }
            "mixed" | "string" | "int" | "integer" | "float" | "double" | "bool" | "boolean" | "object"
            | "true" | "false" | "self" | "static" => {
                returns.schemas.push(gen.classify(member, &self.handler.scope, site)?);
                return Ok(());
            }
            _ => {}
        }

        let fq = gen.types.resolve_class_name(name, &self.handler.scope, site)?;
        let types = &gen.types;
        if types.is_one_of(&fq, &self.config.ignored_route_returns)
            || types.is_kind_of_any(&fq, &self.config.ignored_route_returns)
        {
            debug!("Ignoring return type {} of {}", fq, site);
            return Ok(());
        }

        let contract = known
            .collection
            .iter()
            .chain(&known.data_collection)
            .chain(&known.paginated_data_collection)
            .chain(&known.cursor_paginated_data_collection)
            .chain(&known.paginator)
            .chain(&known.length_aware_paginator)
            .chain(&known.cursor_paginator);
        if types.is_kind_of_any(&fq, contract) {
            if returns.documented(gen, &self.handler, site, false)? == 0 {
                returns.schemas.push(gen.classify(member, &self.handler.scope, site)?);
            }
            return Ok(());
        }

        let json_single = types.is_kind_of_any(&fq, &known.json_resource)
            && !types.is_kind_of_any(&fq, &known.resource_collection);
        let json_collection = types.is_kind_of_any(&fq, &known.resource_collection);
        let attribute_collection = types.is_kind_of_any(&fq, &known.attribute_resource_collection);

        if types.is_one_of(&fq, known.resource_bases()) {
            // the base class says nothing about the payload, the annotation does
            let start = returns.schemas.len();
            if returns.documented(gen, &self.handler, site, false)? == 0 {
                returns.schemas.push(gen.classify(member, &self.handler.scope, site)?);
            }
            for schema in &mut returns.schemas[start..] {
                let mut payload = std::mem::replace(schema, SchemaNode::any_object());
                if (json_collection || attribute_collection) && !matches!(payload, SchemaNode::Array(_)) {
                    payload = SchemaNode::array(payload);
                }
                *schema = if json_single || json_collection { wrap_data(payload) } else { payload };
            }
            return Ok(());
        }

        // a documented subtype or backed resource replaces the declared class
        if self.annotation_refines(gen, &fq, site) && returns.documented(gen, &self.handler, site, true)? > 0 {
            return Ok(());
        }

        let schema = gen.classify(member, &self.handler.scope, site)?;
        returns.schemas.push(if json_single || json_collection { wrap_data(schema) } else { schema });
        Ok(())
    }

    /// Whether a `@return` annotation names a strict subtype of the declared
    /// class `fq`, or a resource backed by it.
    fn annotation_refines(&self, gen: &SchemaGenerator<'_>, fq: &str, site: &str) -> bool {
        let known = gen.known();
        documented_classes(gen, &self.handler, site).into_iter().any(|documented| {
            if normalize_name(&documented) == normalize_name(fq) {
                return false;
            }
            if gen.types.is_kind_of(&documented, fq) {
                return true;
            }
            gen.types.is_kind_of_any(&documented, known.resource_bases())
                && gen
                    .provider()
                    .class(&documented)
                    .and_then(|class| backing_entity(gen, class))
                    .is_some_and(|entity| normalize_name(&entity) == normalize_name(fq))
        })
    }

    fn attach_standard_responses(&mut self, gen: &SchemaGenerator<'_>) {
        let success = match self.response_schema.take() {
            Some(schema) => Response::with_content(&self.handler.name, MediaType::of(schema)),
            None => {
                warn!("No response schema for {} {} ({})", self.method, self.route.uri, self.handler.site);
                Response::new(&self.handler.name)
            }
        };
        self.operation.responses.insert("200".to_string(), success);

        let throws = self.handler.doc.throws();
        if !throws.is_empty() {
            let mut examples = IndexMap::new();
            for tag in throws {
                let fq = gen
                    .types
                    .resolve_class_name(&tag.ty, &self.handler.scope, &self.handler.site)
                    .unwrap_or_else(|_| normalize_name(&tag.ty).to_string());
                let key = tag.description.unwrap_or_else(|| short_name(&fq).to_string());
                examples.insert(key, Example::new(json!({ "message": fq })));
            }
            let media = MediaType {
                schema: message_schema(),
                examples,
            };
            self.operation
                .responses
                .insert("500".to_string(), Response::with_content("Server error", media));
        }

        if self.route.requires_auth() {
            let mut examples = IndexMap::new();
            examples.insert(
                "Unauthenticated".to_string(),
                Example::new(json!({ "message": "Unauthenticated." })),
            );
            let media = MediaType {
                schema: message_schema(),
                examples,
            };
            self.operation
                .responses
                .insert("401".to_string(), Response::with_content("Unauthenticated", media));
        }
    }
}

/// `{message: string}`
fn message_schema() -> SchemaNode {
    ObjectNode::new()
        .with_property("message", SchemaNode::string(), true)
        .into_node()
}

/// Candidate success schemas of one handler
#[derive(Default)]
struct ReturnSchemas {
    schemas: Vec<SchemaNode>,
    /// Whether the `@return` annotation was consumed already
    documented: bool,
}

impl ReturnSchemas {
    /// Adds the schemas of every `@return` annotation, once per handler.
    ///
    /// # Arguments
    ///
    /// * `wrap_resources` - Wrap documented JSON resources in `{data: ...}`
    ///
    /// # Returns
    ///
    /// How many schemas were added
    fn documented(
        &mut self,
        gen: &mut SchemaGenerator<'_>,
        handler: &Handler<'_>,
        site: &str,
        wrap_resources: bool,
    ) -> Result<usize> {
        if self.documented {
            return Ok(0);
        }
        self.documented = true;
        let known = gen.known();
        let mut added = 0;
        for text in handler.doc.return_types() {
            let ty = TypeDescriptor::parse(text).map_err(|_| Error::unknown_type(site, text))?;
            let (members, nullable) = ty.members();
            for member in members {
                let mut schema = gen.classify(member, &handler.scope, site)?;
                if wrap_resources {
                    let json_resource = member
                        .base_name()
                        .and_then(|name| gen.types.resolve_class_name(name, &handler.scope, site).ok())
                        .is_some_and(|fq| {
                            gen.types.is_kind_of_any(&fq, &known.json_resource)
                                || gen.types.is_kind_of_any(&fq, &known.resource_collection)
                        });
                    if json_resource {
                        schema = wrap_data(schema);
                    }
                }
                self.schemas.push(if nullable { schema.with_nullable(true) } else { schema });
                added += 1;
            }
        }
        Ok(added)
    }
}

/// Classes named by the handler's `@return` annotations.
fn documented_classes(gen: &SchemaGenerator<'_>, handler: &Handler<'_>, site: &str) -> Vec<String> {
    handler
        .doc
        .return_types()
        .filter_map(|text| TypeDescriptor::parse(text).ok())
        .flat_map(|ty| {
            let (members, _) = ty.members();
            members
                .into_iter()
                .filter_map(|member| member.base_name())
                .filter_map(|name| gen.types.resolve_class_name(name, &handler.scope, site).ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Operation id, by priority: method `@id` (qualified by the class `@id`),
/// route name, controller and method, URI.
fn operation_id(route: &RouteDefinition, handler: &Handler<'_>, class_doc: &DocBlock) -> String {
    if let Some(id) = handler.doc.id() {
        return match class_doc.id() {
            Some(prefix) => format!("{}.{}", prefix, id),
            None => id.to_string(),
        };
    }
    if let Some(name) = route.name.as_deref().filter(|name| !name.is_empty()) {
        return name.to_string();
    }
    if let Some(class) = handler.class {
        return format!("{}.{}", class.name.replace('\\', "."), handler.name);
    }
    route.uri.clone()
}

/// Field set of a validated input class: its annotated properties, or
/// required strings named after the keys its `rules()` returns.
pub fn validated_input_fields(gen: &mut SchemaGenerator<'_>, fq: &str) -> Result<ObjectNode> {
    let schema = class_resolver::resolve_class(gen, fq, false, true)?;
    let mut fields = schema.as_object().cloned().unwrap_or_default();
    fields.nullable = false;
    if !fields.properties.is_empty() {
        return Ok(fields);
    }

    let Some(class) = gen.provider().class(fq) else {
        return Ok(fields);
    };
    if let Some(rules) = gen.find_method(class, "rules") {
        for key in gen.source().returned_literal_keys(rules.body()) {
            fields.insert(&key, SchemaNode::string(), true);
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnownTypes;
    use crate::metadata::{manifest_from_yaml, ProjectManifest};
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
routes:
  - uri: api/users/{user}
    methods: [GET, HEAD]
    name: api.users.show
    middleware: [api, "auth:sanctum"]
    action: {kind: method, controller: App\Http\Controllers\UserController, method: show}
  - uri: api/users
    methods: [POST]
    middleware: [api]
    action: {kind: method, controller: App\Http\Controllers\UserController, method: store}
  - uri: api/users
    methods: [GET]
    action: {kind: method, controller: App\Http\Controllers\UserController, method: index}
  - uri: api/ping
    methods: [GET]
    action:
      kind: closure
      return_type: string
  - uri: api/search
    methods: [POST]
    action:
      kind: closure
      namespace: App
      imports:
        Request: Illuminate\Http\Request
      params: [{name: request, type: Request}]
      doc: "/** @param array{term: string, page?: int} $request */"
  - uri: api/upload
    methods: [POST]
    action: {kind: method, controller: App\Http\Controllers\UserController, method: avatar}
  - uri: api/legacy
    methods: [GET]
    action: {kind: view}
  - uri: api/back
    methods: [GET]
    action: {kind: method, controller: App\Http\Controllers\UserController, method: back}
  - uri: api/profile
    methods: [GET]
    action: {kind: method, controller: App\Http\Controllers\UserController, method: profile}
  - uri: api/lookup
    methods: [GET]
    action: {kind: method, controller: App\Http\Controllers\UserController, method: lookup}
  - uri: api/team
    methods: [GET]
    action: {kind: method, controller: App\Http\Controllers\UserController, method: team}
classes:
  - name: App\Http\Controllers\UserController
    doc: |
      /**
       * @tag Users
       */
    imports:
      User: App\Models\User
      UserResource: App\Http\Resources\UserResource
      StoreUserRequest: App\Http\Requests\StoreUserRequest
      AvatarRequest: App\Http\Requests\AvatarRequest
      Paginator: Illuminate\Contracts\Pagination\LengthAwarePaginator
      ModelNotFoundException: Illuminate\Database\Eloquent\ModelNotFoundException
      RedirectResponse: Illuminate\Http\RedirectResponse
      Team: App\Support\Team
    methods:
      - name: show
        params: [{name: user, type: User}]
        return_type: UserResource
        doc: |
          /**
           * Show a user.
           *
           * Returns the public profile.
           *
           * @param User $user The user id
           * @tag Profiles
           * @throws ModelNotFoundException When the user is missing
           */
      - name: store
        params: [{name: request, type: StoreUserRequest}]
        return_type: UserResource
        doc: "/** @id createUser */"
      - name: index
        params: [{name: request, type: StoreUserRequest}]
        return_type: Paginator
        doc: "/** @return Paginator<User> */"
      - name: avatar
        params: [{name: request, type: AvatarRequest}]
      - name: back
        return_type: "RedirectResponse|User"
      - name: profile
        return_type: User
        doc: "/** @return UserResource */"
      - name: lookup
        return_type: array
        doc: |
          /**
           * @return User
           * @return UserResource
           */
      - name: team
        return_type: Team
        doc: "/** @return User[] */"
  - name: App\Support\Team
    parents: [Illuminate\Support\Collection]
  - name: App\Http\Requests\StoreUserRequest
    parents: [Illuminate\Foundation\Http\FormRequest]
    methods:
      - name: rules
        body: "return ['email' => 'required|email', 'password' => ['required', 'min:8']];"
  - name: App\Http\Requests\AvatarRequest
    parents: [Illuminate\Foundation\Http\FormRequest]
    imports:
      UploadedFile: Illuminate\Http\UploadedFile
    fields:
      - {name: avatar, type: UploadedFile}
      - {name: caption, type: '?string'}
  - name: App\Models\User
    parents: [Illuminate\Database\Eloquent\Model]
  - name: App\Http\Resources\UserResource
    parents: [Illuminate\Http\Resources\Json\JsonResource]
    doc: "/** @mixin \\App\\Models\\User */"
    methods:
      - name: toArray
        body: "return ['id' => $this->id];"
tables:
  - name: users
    columns:
      - {name: id, type_name: bigint}
"#;

    fn build(manifest: &ProjectManifest, index: usize, method: HttpMethod) -> Result<Operation> {
        let config = GeneratorConfig::default();
        let known = KnownTypes::default();
        let mut gen = SchemaGenerator::new(manifest, &known);
        build_operation(&mut gen, &manifest.routes[index], method, &config)
    }

    #[test]
    fn test_metadata_and_path_parameters() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 0, HttpMethod::Get).unwrap();

        assert_eq!(operation.operation_id, "api.users.show");
        assert_eq!(operation.tags, vec!["Users", "Profiles"]);
        assert_eq!(operation.summary.as_deref(), Some("Show a user."));
        assert_eq!(operation.description.as_deref(), Some("Returns the public profile."));
        assert_eq!(operation.parameters.len(), 1);
        assert_eq!(operation.parameters[0].name, "user");
        assert_eq!(operation.parameters[0].location, "path");
        assert_eq!(operation.parameters[0].description.as_deref(), Some("The user id"));
    }

    #[test]
    fn test_resource_return_wrapped_in_data() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 0, HttpMethod::Get).unwrap();

        let success = &operation.responses["200"];
        assert_eq!(success.description, "show");
        let schema = &success.content[JSON_CONTENT].schema;
        assert_eq!(schema, &wrap_data(SchemaNode::reference("UserResource")));
    }

    #[test]
    fn test_error_and_auth_responses() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 0, HttpMethod::Get).unwrap();

        assert_eq!(operation.responses.keys().collect::<Vec<_>>(), vec!["200", "500", "401"]);
        let server_error = &operation.responses["500"].content[JSON_CONTENT];
        assert_eq!(
            server_error.examples["When the user is missing"].value,
            json!({"message": "Illuminate\\Database\\Eloquent\\ModelNotFoundException"})
        );
        let unauthenticated = &operation.responses["401"].content[JSON_CONTENT];
        assert_eq!(
            unauthenticated.examples["Unauthenticated"].value,
            json!({"message": "Unauthenticated."})
        );
    }

    #[test]
    fn test_validated_input_in_body() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 1, HttpMethod::Post).unwrap();

        assert_eq!(operation.operation_id, "createUser");
        assert!(operation.parameters.is_empty());
        let body = operation.request_body.unwrap();
        assert_eq!(body.content.keys().collect::<Vec<_>>(), vec![JSON_CONTENT, FORM_CONTENT]);

        let expected = ObjectNode::new()
            .with_property("email", SchemaNode::string(), true)
            .with_property("password", SchemaNode::string(), true)
            .into_node();
        assert_eq!(body.content[JSON_CONTENT].schema, expected);
        assert_eq!(body.content[FORM_CONTENT].schema, expected);
        assert!(!operation.responses.contains_key("401"));
        assert!(!operation.responses.contains_key("500"));
    }

    #[test]
    fn test_validated_input_as_query_parameters() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 2, HttpMethod::Get).unwrap();

        assert!(operation.request_body.is_none());
        let query: Vec<_> = operation
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.location.as_str(), p.required))
            .collect();
        assert_eq!(query, vec![("email", "query", true), ("password", "query", true)]);
        assert_eq!(
            operation.operation_id,
            "App.Http.Controllers.UserController.index"
        );
    }

    #[test]
    fn test_paginator_return_uses_annotation() {
        let manifest = manifest_from_yaml(MANIFEST);
        let config = GeneratorConfig::default();
        let known = KnownTypes::default();
        let mut gen = SchemaGenerator::new(&manifest, &known);
        let operation = build_operation(&mut gen, &manifest.routes[2], HttpMethod::Get, &config).unwrap();

        let schema = &operation.responses["200"].content[JSON_CONTENT].schema;
        assert_eq!(schema, &SchemaNode::reference("User_LengthAwarePaginator"));
        assert!(gen.finish().unwrap().contains_key("User_LengthAwarePaginator"));
    }

    #[test]
    fn test_closure_handler() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 3, HttpMethod::Get).unwrap();

        assert_eq!(operation.operation_id, "api/ping");
        let success = &operation.responses["200"];
        assert_eq!(success.description, "closure");
        assert_eq!(success.content[JSON_CONTENT].schema, SchemaNode::string());
    }

    #[test]
    fn test_raw_request_shape() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 4, HttpMethod::Post).unwrap();

        let body = operation.request_body.unwrap();
        let expected = ObjectNode::new()
            .with_property("term", SchemaNode::string(), true)
            .with_property("page", SchemaNode::int32(), false)
            .into_node();
        assert_eq!(body.content[JSON_CONTENT].schema, expected);
        assert!(operation.responses["200"].content.is_empty(), "no return type means no body");
    }

    #[test]
    fn test_binary_input_is_form_only() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 5, HttpMethod::Post).unwrap();

        let body = operation.request_body.unwrap();
        assert_eq!(body.content.keys().collect::<Vec<_>>(), vec![FORM_CONTENT]);
        let fields = body.content[FORM_CONTENT].schema.as_object().unwrap();
        assert_eq!(fields.properties["avatar"], SchemaNode::string_format("binary"));
        assert_eq!(fields.required.iter().collect::<Vec<_>>(), vec!["avatar"]);
    }

    #[test]
    fn test_unknown_handler() {
        let manifest = manifest_from_yaml(MANIFEST);
        let err = build(&manifest, 6, HttpMethod::Get).unwrap_err();
        assert!(matches!(err, Error::UnknownHandler { ref route } if route.contains("api/legacy")));
    }

    #[test]
    fn test_ignored_return_member() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 7, HttpMethod::Get).unwrap();
        let schema = &operation.responses["200"].content[JSON_CONTENT].schema;
        assert_eq!(schema, &SchemaNode::reference("User"));
    }

    #[test]
    fn test_documented_resource_refines_declared_entity() {
        let manifest = manifest_from_yaml(MANIFEST);
        let config = GeneratorConfig::default();
        let known = KnownTypes::default();
        let mut gen = SchemaGenerator::new(&manifest, &known);
        let operation = build_operation(&mut gen, &manifest.routes[8], HttpMethod::Get, &config).unwrap();

        let schema = &operation.responses["200"].content[JSON_CONTENT].schema;
        assert_eq!(schema, &wrap_data(SchemaNode::reference("UserResource")));
        let components = gen.finish().unwrap();
        assert!(components.contains_key("UserResource"));
        assert!(!components.contains_key("User"));
    }

    #[test]
    fn test_every_return_annotation_is_merged() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 9, HttpMethod::Get).unwrap();

        let schema = &operation.responses["200"].content[JSON_CONTENT].schema;
        assert_eq!(
            schema,
            &SchemaNode::one_of(vec![
                SchemaNode::reference("User"),
                SchemaNode::reference("UserResource"),
            ])
        );
    }

    #[test]
    fn test_collection_subclass_uses_annotation() {
        let manifest = manifest_from_yaml(MANIFEST);
        let operation = build(&manifest, 10, HttpMethod::Get).unwrap();

        let schema = &operation.responses["200"].content[JSON_CONTENT].schema;
        assert_eq!(schema, &SchemaNode::array(SchemaNode::reference("User")));
    }

    #[test]
    fn test_state_sequence() {
        let manifest = manifest_from_yaml(MANIFEST);
        let config = GeneratorConfig::default();
        let known = KnownTypes::default();
        let mut gen = SchemaGenerator::new(&manifest, &known);
        let mut builder = OperationBuilder::new(&gen, &manifest.routes[3], HttpMethod::Get, &config).unwrap();

        let mut states = vec![builder.state()];
        while builder.state() != BuildState::Done {
            states.push(builder.step(&mut gen).unwrap());
        }
        assert_eq!(
            states,
            vec![
                BuildState::CollectMetadata,
                BuildState::ResolveParameters,
                BuildState::ResolveRequestBody,
                BuildState::ResolveReturnType,
                BuildState::AttachStandardResponses,
                BuildState::Done,
            ]
        );
    }
}
