use crate::class_resolver;
use crate::config::{KnownTypes, RelationArity};
use crate::docblock::TypeDescriptor;
use crate::envelope::EnvelopeKind;
use crate::error::{Error, Result};
use crate::metadata::{short_name, ClassDescriptor, MetadataProvider, MethodDescriptor};
use crate::registry::{RegistryHost, SchemaRegistry};
use crate::resource;
use crate::schema::{merge_schemas, ObjectNode, SchemaNode};
use crate::source_query::{LiteralScanner, SourceQuery};
use crate::type_resolver::{Scope, TypeResolver};
use indexmap::IndexMap;
use log::debug;

/// Schema generator - classifies type descriptors into schema nodes.
///
/// One generator is the generation context of one output target: it owns the
/// component registry, so nothing leaks between targets.
pub struct SchemaGenerator<'p> {
    /// Name resolution and "kind of" queries
    pub types: TypeResolver<'p>,
    /// Static source inspection
    source: Box<dyn SourceQuery>,
    /// Named schemas awaiting or done with resolution
    registry: SchemaRegistry<SchemaGenerator<'p>>,
}

/// A resolved class together with its generic arguments
#[derive(Debug, Clone)]
pub struct ClassTarget {
    pub fq: String,
    pub args: Vec<TypeDescriptor>,
}

type RuleMatch = fn(&SchemaGenerator<'_>, &ClassTarget) -> bool;
type RuleApply = fn(&mut SchemaGenerator<'_>, &ClassTarget, &Scope, &str) -> Result<SchemaNode>;

/// One class classification strategy
pub struct ClassRule {
    pub name: &'static str,
    matches: RuleMatch,
    apply: RuleApply,
}

/// Class rules in priority order. The generic class rule always matches.
pub static CLASS_RULES: &[ClassRule] = &[
    ClassRule {
        name: "date-time",
        matches: is_date_time,
        apply: apply_date_time,
    },
    ClassRule {
        name: "uploaded-file",
        matches: is_uploaded_file,
        apply: apply_uploaded_file,
    },
    ClassRule {
        name: "resource",
        matches: is_resource,
        apply: apply_resource,
    },
    ClassRule {
        name: "envelope",
        matches: is_envelope,
        apply: apply_envelope,
    },
    ClassRule {
        name: "class",
        matches: is_any_class,
        apply: apply_class,
    },
];

impl<'p> RegistryHost for SchemaGenerator<'p> {
    fn registry(&mut self) -> &mut SchemaRegistry<Self> {
        &mut self.registry
    }
}

impl<'p> SchemaGenerator<'p> {
    pub fn new(provider: &'p dyn MetadataProvider, known: &'p KnownTypes) -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            types: TypeResolver::new(provider, known),
            source: Box::new(LiteralScanner),
            registry: SchemaRegistry::new(),
        }
    }

    /// Replaces the source inspection service.
    pub fn with_source(mut self, source: Box<dyn SourceQuery>) -> Self {
        self.source = source;
        self
    }

    pub fn provider(&self) -> &'p dyn MetadataProvider {
        self.types.provider()
    }

    /// Method `name` of `class`, declared on it or inherited from a described ancestor.
    pub fn find_method(&self, class: &ClassDescriptor, name: &str) -> Option<&'p MethodDescriptor> {
        let provider = self.provider();
        provider
            .method(&class.name, name)
            .or_else(|| class.parents.iter().find_map(|parent| provider.method(parent, name)))
    }

    pub fn known(&self) -> &'p KnownTypes {
        self.types.known()
    }

    pub fn source(&self) -> &dyn SourceQuery {
        self.source.as_ref()
    }

    /// Parses and classifies a type expression.
    pub fn classify_str(&mut self, text: &str, scope: &Scope, site: &str) -> Result<SchemaNode> {
        let ty = TypeDescriptor::parse(text).map_err(|_| Error::unknown_type(site, text))?;
        self.classify(&ty, scope, site)
    }

    /// Classifies one type descriptor.
    ///
    /// # Arguments
    ///
    /// * `ty` - Parsed type expression
    /// * `scope` - Namespace and imports used to resolve class names
    /// * `site` - Route, method or property being resolved, for diagnostics
    ///
    /// # Returns
    ///
    /// An inline schema, or a reference to a registered component for classes
    pub fn classify(&mut self, ty: &TypeDescriptor, scope: &Scope, site: &str) -> Result<SchemaNode> {
        match ty {
            TypeDescriptor::Union(_) | TypeDescriptor::Nullable(_) => {
                let (members, nullable) = ty.members();
                let mut schemas = Vec::with_capacity(members.len());
                for member in members {
                    schemas.push(self.classify(member, scope, site)?);
                }
                merge_schemas(schemas, nullable).ok_or_else(|| Error::unknown_type(site, ty))
            }
            TypeDescriptor::Named(name) => self.classify_named(name, &[], scope, site),
            TypeDescriptor::Generic { base, args } => self.classify_named(base, args, scope, site),
            TypeDescriptor::List(inner) => Ok(SchemaNode::array(self.classify(inner, scope, site)?)),
            TypeDescriptor::Shape(entries) => {
                let mut object = ObjectNode::new();
                for entry in entries {
                    let schema = self.classify(&entry.value, scope, site)?;
                    object.insert(&entry.key, schema, !entry.optional);
                }
                Ok(object.into_node())
            }
        }
    }

    fn classify_named(
        &mut self,
        name: &str,
        args: &[TypeDescriptor],
        scope: &Scope,
        site: &str,
    ) -> Result<SchemaNode> {
        if let Some(schema) = primitive_schema(name) {
            return Ok(schema);
        }

        let fq = match name.to_ascii_lowercase().as_str() {
            "null" | "void" | "never" | "callable" | "resource" => {
                return Err(Error::unknown_type(site, name));
            }
            "self" | "static" | "$this" => scope
                .owner
                .clone()
                .ok_or_else(|| Error::unknown_type(site, name))?,
            _ => self.types.resolve_class_name(name, scope, site)?,
        };

        self.classify_class(
            &ClassTarget {
                fq,
                args: args.to_vec(),
            },
            scope,
            site,
        )
    }

    /// Runs the class rules in priority order.
    pub fn classify_class(&mut self, target: &ClassTarget, scope: &Scope, site: &str) -> Result<SchemaNode> {
        for rule in CLASS_RULES {
            if (rule.matches)(self, target) {
                debug!("Classifying {} with the {} rule", target.fq, rule.name);
                return (rule.apply)(self, target, scope, site);
            }
        }
        Err(Error::unknown_type(site, &target.fq))
    }

    /// Registers `fq` as a component named after its short name and returns
    /// a reference to it.
    pub fn class_reference(&mut self, fq: &str) -> Result<SchemaNode> {
        if self.provider().class(fq).is_none() {
            return Err(Error::UnlocatableClass {
                name: fq.to_string(),
                context: "schema resolution".to_string(),
            });
        }
        let name = short_name(fq).to_string();
        let fq = fq.to_string();
        self.register(name.clone(), move |gen: &mut SchemaGenerator<'p>| {
            class_resolver::resolve_class(gen, &fq, false, false)
        });
        Ok(SchemaNode::reference(name))
    }

    /// Registers a component resolver; the first registration of a name wins.
    pub fn register<F>(&mut self, name: impl Into<String>, resolver: F) -> bool
    where
        F: FnOnce(&mut SchemaGenerator<'p>) -> Result<SchemaNode> + 'static,
    {
        self.registry.register(name, resolver)
    }

    /// Resolves every pending component.
    pub fn drain(&mut self) -> Result<()> {
        SchemaRegistry::drain_all(self)
    }

    pub fn components(&self) -> &IndexMap<String, SchemaNode> {
        self.registry.resolved()
    }

    /// Drains the registry and hands out the materialized components.
    pub fn finish(mut self) -> Result<IndexMap<String, SchemaNode>> {
        self.drain()?;
        Ok(self.registry.into_resolved())
    }
}

/// Schema of a primitive keyword, if `name` is one.
fn primitive_schema(name: &str) -> Option<SchemaNode> {
    if name.contains('\\') {
        return None;
    }
    let schema = match name.to_ascii_lowercase().as_str() {
        "string" | "non-empty-string" | "numeric-string" | "class-string" | "lowercase-string"
        | "literal-string" => SchemaNode::string(),
        "int" | "integer" | "positive-int" | "negative-int" | "non-negative-int" | "non-positive-int" => {
            SchemaNode::int32()
        }
        "float" | "double" => SchemaNode::float(),
        "numeric" => SchemaNode::number(),
        "bool" | "boolean" | "true" | "false" => SchemaNode::boolean(),
        "object" | "mixed" => SchemaNode::any_object(),
        "array" | "iterable" | "list" | "non-empty-array" | "non-empty-list" => {
            SchemaNode::array(SchemaNode::any_object())
        }
        _ => return None,
    };
    Some(schema)
}

fn is_date_time(gen: &SchemaGenerator<'_>, target: &ClassTarget) -> bool {
    target.args.is_empty() && gen.types.is_kind_of_any(&target.fq, &gen.known().date_time)
}

fn is_uploaded_file(gen: &SchemaGenerator<'_>, target: &ClassTarget) -> bool {
    target.args.is_empty() && gen.types.is_kind_of_any(&target.fq, &gen.known().uploaded_file)
}

fn apply_date_time(_: &mut SchemaGenerator<'_>, _: &ClassTarget, _: &Scope, _: &str) -> Result<SchemaNode> {
    Ok(SchemaNode::string_format("date-time"))
}

fn apply_uploaded_file(_: &mut SchemaGenerator<'_>, _: &ClassTarget, _: &Scope, _: &str) -> Result<SchemaNode> {
    Ok(SchemaNode::string_format("binary"))
}

fn is_any_class(_: &SchemaGenerator<'_>, _: &ClassTarget) -> bool {
    true
}

fn apply_class(gen: &mut SchemaGenerator<'_>, target: &ClassTarget, _: &Scope, _: &str) -> Result<SchemaNode> {
    gen.class_reference(&target.fq)
}

fn is_resource(gen: &SchemaGenerator<'_>, target: &ClassTarget) -> bool {
    target.args.is_empty() && gen.types.is_kind_of_any(&target.fq, gen.known().resource_bases())
}

fn is_envelope(gen: &SchemaGenerator<'_>, target: &ClassTarget) -> bool {
    !target.args.is_empty() || wrapping_of(gen, &target.fq).is_some()
}

fn apply_resource(
    gen: &mut SchemaGenerator<'_>,
    target: &ClassTarget,
    _scope: &Scope,
    site: &str,
) -> Result<SchemaNode> {
    let known = gen.known();

    if gen.types.is_one_of(&target.fq, known.resource_bases()) {
        // base identities carry no item information
        let single = gen
            .types
            .is_one_of(&target.fq, known.json_resource.iter().chain(&known.attribute_resource));
        return Ok(if single {
            SchemaNode::any_object()
        } else {
            SchemaNode::array(SchemaNode::any_object())
        });
    }

    let collections = known
        .resource_collection
        .iter()
        .chain(&known.attribute_resource_collection);
    if gen.types.is_kind_of_any(&target.fq, collections) {
        return resource::collection_items(gen, &target.fq, site);
    }
    if gen.types.is_kind_of_any(&target.fq, &known.attribute_resource) {
        return resource::attribute_resource_component(gen, &target.fq);
    }
    resource::json_resource_component(gen, &target.fq)
}

/// How an envelope-like class wraps its item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrapping {
    Single,
    List,
    Envelope(EnvelopeKind),
}

fn wrapping_of(gen: &SchemaGenerator<'_>, fq: &str) -> Option<Wrapping> {
    let known = gen.known();
    let types = &gen.types;

    if types.is_kind_of_any(fq, &known.paginated_data_collection) {
        return Some(Wrapping::Envelope(EnvelopeKind::DataPaginator));
    }
    if types.is_kind_of_any(fq, &known.cursor_paginated_data_collection) {
        return Some(Wrapping::Envelope(EnvelopeKind::DataCursorPaginator));
    }
    if types.is_kind_of_any(fq, known.data_collection.iter().chain(&known.collection)) {
        return Some(Wrapping::List);
    }
    if let Some(arity) = known
        .relations
        .iter()
        .find(|(relation, _)| types.is_kind_of(fq, relation))
        .map(|(_, arity)| *arity)
    {
        return Some(match arity {
            RelationArity::Single => Wrapping::Single,
            RelationArity::Multiple => Wrapping::List,
        });
    }
    if types.is_kind_of_any(
        fq,
        known.resource_collection.iter().chain(&known.attribute_resource_collection),
    ) {
        return Some(Wrapping::List);
    }
    if types.is_kind_of_any(fq, known.json_resource.iter().chain(&known.attribute_resource)) {
        return Some(Wrapping::Single);
    }
    if types.is_kind_of_any(fq, &known.length_aware_paginator) {
        return Some(Wrapping::Envelope(EnvelopeKind::LengthAwarePaginator));
    }
    if types.is_kind_of_any(fq, &known.paginator) {
        return Some(Wrapping::Envelope(EnvelopeKind::Paginator));
    }
    if types.is_kind_of_any(fq, &known.cursor_paginator) {
        return Some(Wrapping::Envelope(EnvelopeKind::CursorPaginator));
    }
    None
}

fn apply_envelope(
    gen: &mut SchemaGenerator<'_>,
    target: &ClassTarget,
    scope: &Scope,
    site: &str,
) -> Result<SchemaNode> {
    let Some(wrapping) = wrapping_of(gen, &target.fq) else {
        return Err(Error::UnrecognizedCollectionType {
            name: target.fq.clone(),
            class: site.to_string(),
        });
    };

    let item = match target.args.last() {
        Some(item) => Some(gen.classify(item, scope, site)?),
        None => None,
    };

    Ok(match (wrapping, item) {
        (Wrapping::Single, Some(item)) => item,
        (Wrapping::Single, None) => SchemaNode::any_object(),
        (Wrapping::List, Some(item)) => SchemaNode::array(item),
        (Wrapping::List, None) => SchemaNode::array(SchemaNode::any_object()),
        (Wrapping::Envelope(kind), Some(item)) => {
            let name = kind.component_name(&component_label(&item));
            gen.register(name.clone(), move |_| Ok(kind.wrap(item)));
            SchemaNode::reference(name)
        }
        (Wrapping::Envelope(kind), None) => {
            let name = kind.name();
            gen.register(name, move |_| Ok(kind.wrap(SchemaNode::any_object())));
            SchemaNode::reference(name)
        }
    })
}

/// Name fragment identifying an envelope's item in its component name.
///
/// Inline objects spell out every property, so two different shapes wrapped
/// in the same envelope never share a component.
fn component_label(item: &SchemaNode) -> String {
    let label = match item {
        SchemaNode::Ref(node) => node.target.clone(),
        SchemaNode::Primitive(node) => match node.format.as_deref() {
            Some(format) => name_fragment(format),
            None => node.kind.as_str().to_string(),
        },
        SchemaNode::Array(node) => format!("{}List", component_label(&node.items)),
        SchemaNode::Object(node) if node.properties.is_empty() => "Object".to_string(),
        SchemaNode::Object(node) => {
            let mut label = "Object".to_string();
            for (name, property) in &node.properties {
                let optional = if node.required.contains(name) { "" } else { "Opt" };
                label.push_str(&format!("_{}{}_{}", name_fragment(name), optional, component_label(property)));
            }
            label
        }
        SchemaNode::OneOf(node) => node
            .variants
            .iter()
            .map(component_label)
            .collect::<Vec<_>>()
            .join("Or"),
    };
    if item.is_nullable() {
        format!("{}OrNull", label)
    } else {
        label
    }
}

/// `date-time` -> `dateTime`; anything outside `[A-Za-z0-9]` separates words.
fn name_fragment(text: &str) -> String {
    let mut fragment = String::new();
    let mut upper = false;
    for c in text.chars() {
        if !c.is_ascii_alphanumeric() {
            upper = !fragment.is_empty();
            continue;
        }
        if upper {
            fragment.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            fragment.push(c);
        }
    }
    fragment
}
