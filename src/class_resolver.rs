//! Object schemas of declarative classes.
//!
//! Persisted entities are delegated to [`model_resolver`](crate::model_resolver).

use crate::docblock::{DocBlock, TypeDescriptor};
use crate::error::{Error, Result};
use crate::metadata::{ClassDescriptor, FieldDescriptor, Visibility};
use crate::model_resolver;
use crate::schema::{ObjectNode, SchemaNode};
use crate::schema_generator::SchemaGenerator;
use crate::type_resolver::Scope;
use indexmap::IndexMap;
use log::debug;

/// Builds the object schema of the class `fq`.
///
/// `annotations_only` accepts fields with no type signal at all, for request
/// input classes whose field set comes from validation rules instead.
pub fn resolve_class(
    gen: &mut SchemaGenerator<'_>,
    fq: &str,
    nullable: bool,
    annotations_only: bool,
) -> Result<SchemaNode> {
    let class = gen.provider().class(fq).ok_or_else(|| Error::UnlocatableClass {
        name: fq.to_string(),
        context: "class resolution".to_string(),
    })?;

    if gen.types.is_kind_of_any(&class.name, &gen.known().entity) {
        return model_resolver::resolve_entity(gen, class, nullable);
    }
    if gen.types.is_kind_of_any(&class.name, &gen.known().date_time) {
        return Ok(SchemaNode::string_format("date-time").with_nullable(nullable));
    }

    debug!("Resolving declarative class {}", class.name);
    let scope = Scope::of_class(class);
    let doc = class.doc_block();
    let mut documented = documented_properties(gen, class, &doc, &scope)?;

    let mut object = ObjectNode::new();
    for field in gen
        .provider()
        .fields(&class.name)
        .iter()
        .filter(|field| field.visibility == Visibility::Public && !field.is_static)
    {
        let site = format!("{}::${}", class.name, field.name);
        match field_schema(gen, field, &mut documented, &scope, &site)? {
            Some(schema) => {
                let required = !schema.is_nullable();
                object.insert(&field.name, schema, required);
            }
            None if annotations_only => {
                debug!("No schema for {}, skipping", site);
            }
            None => {
                return Err(Error::UnresolvableStructure {
                    class: class.name.clone(),
                    member: field.name.clone(),
                });
            }
        }
    }

    // magic properties only described by the class documentation
    for (name, schema) in documented {
        if !object.properties.contains_key(&name) {
            let required = !schema.is_nullable();
            object.insert(&name, schema, required);
        }
    }

    object.nullable = nullable;
    Ok(object.into_node())
}

/// Schemas of the class-level `@property`/`@property-read` tags, by name.
pub fn documented_properties(
    gen: &mut SchemaGenerator<'_>,
    class: &ClassDescriptor,
    doc: &DocBlock,
    scope: &Scope,
) -> Result<IndexMap<String, SchemaNode>> {
    let mut properties = IndexMap::new();
    for property in doc.properties() {
        let site = format!("{}::${}", class.name, property.name);
        let schema = gen.classify_str(&property.ty, scope, &site)?;
        properties.entry(property.name).or_insert(schema);
    }
    Ok(properties)
}

/// Schema of one field. When the native type is missing or a bare list, the
/// field's `@var` tag and then the class-level property tag take precedence.
fn field_schema(
    gen: &mut SchemaGenerator<'_>,
    field: &FieldDescriptor,
    documented: &mut IndexMap<String, SchemaNode>,
    scope: &Scope,
    site: &str,
) -> Result<Option<SchemaNode>> {
    let native = match &field.ty {
        Some(text) => Some(TypeDescriptor::parse(text).map_err(|_| Error::unknown_type(site, text))?),
        None => None,
    };

    let (bare_list, nullable) = match &native {
        Some(ty) => {
            let (members, nullable) = ty.members();
            let bare = members.len() == 1 && is_bare_list(members[0]);
            (bare, nullable)
        }
        None => (false, false),
    };

    if native.is_none() || bare_list {
        if let Some(var) = field.doc_block().var_type() {
            let schema = gen.classify_str(var, scope, site)?;
            return Ok(Some(if nullable { schema.with_nullable(true) } else { schema }));
        }
        if let Some(schema) = documented.shift_remove(&field.name) {
            return Ok(Some(schema));
        }
    }

    match native {
        Some(ty) => gen.classify(&ty, scope, site).map(Some),
        None => Ok(None),
    }
}

fn is_bare_list(ty: &TypeDescriptor) -> bool {
    matches!(ty, TypeDescriptor::Named(name)
        if matches!(name.to_ascii_lowercase().as_str(), "array" | "iterable" | "list"))
}
