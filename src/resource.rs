//! API resource transformers.
//!
//! A resource class is registered as a component named after its short name.
//! The component body is the transformation output: the annotated return type
//! of `toArray`/`toAttributes` when there is one, otherwise the attribute names
//! recovered from the method body, typed after the backing entity.

use crate::class_resolver;
use crate::docblock::TypeDescriptor;
use crate::error::{Error, Result};
use crate::metadata::{ClassDescriptor, MethodDescriptor};
use crate::schema::{ObjectNode, SchemaNode};
use crate::schema_generator::{ClassTarget, SchemaGenerator};
use crate::source_query::{string_values, Expr};
use crate::type_resolver::Scope;
use log::debug;

/// Wraps a payload the way resources are sent over the wire.
pub fn wrap_data(schema: SchemaNode) -> SchemaNode {
    ObjectNode::new().with_property("data", schema, true).into_node()
}

/// Registers the component of a JSON resource and returns a reference to it.
pub fn json_resource_component(gen: &mut SchemaGenerator<'_>, fq: &str) -> Result<SchemaNode> {
    let class = locate(gen, fq)?;
    let name = class.short_name().to_string();
    let fq = fq.to_string();
    gen.register(name.clone(), move |gen| json_resource_schema(gen, &fq));
    Ok(SchemaNode::reference(name))
}

/// Registers the component of an attribute-style resource,
/// `{id, attributes}`, and returns a reference to it.
pub fn attribute_resource_component(gen: &mut SchemaGenerator<'_>, fq: &str) -> Result<SchemaNode> {
    let class = locate(gen, fq)?;
    let name = class.short_name().to_string();
    let fq = fq.to_string();
    gen.register(name.clone(), move |gen| attribute_resource_schema(gen, &fq));
    Ok(SchemaNode::reference(name))
}

/// Item list of a concrete resource collection.
///
/// The item class comes from the `collects` field, then from the naming
/// convention (`UserCollection` collects `UserResource` or `User`).
pub fn collection_items(gen: &mut SchemaGenerator<'_>, fq: &str, site: &str) -> Result<SchemaNode> {
    let class = locate(gen, fq)?;
    let scope = Scope::of_class(class);

    let collected = class
        .field("collects")
        .and_then(|field| field.default.as_deref())
        .and_then(|text| gen.source().initializer(text));
    let item = match collected {
        Some(Expr::ClassRef(name)) => Some(gen.types.resolve_class_name(&name, &scope, site)?),
        _ => guess_collected(gen, class),
    };

    match item {
        Some(item) => {
            debug!("{} collects {}", class.name, item);
            let schema = gen.classify_class(&ClassTarget { fq: item, args: Vec::new() }, &scope, site)?;
            Ok(SchemaNode::array(schema))
        }
        None => {
            debug!("No collected class found for {}", class.name);
            Ok(SchemaNode::array(SchemaNode::any_object()))
        }
    }
}

fn guess_collected(gen: &SchemaGenerator<'_>, class: &ClassDescriptor) -> Option<String> {
    let stem = class.short_name().strip_suffix("Collection")?;
    if stem.is_empty() {
        return None;
    }
    let namespace = class.namespace();
    [format!("{}Resource", stem), stem.to_string()]
        .into_iter()
        .map(|name| match namespace {
            "" => name,
            namespace => format!("{}\\{}", namespace, name),
        })
        .find(|candidate| gen.provider().class(candidate).is_some())
}

fn json_resource_schema(gen: &mut SchemaGenerator<'_>, fq: &str) -> Result<SchemaNode> {
    let class = locate(gen, fq)?;
    let scope = Scope::of_class(class);
    let site = format!("{}::toArray", class.name);

    let Some(method) = gen.find_method(class, "toArray") else {
        return resource_attributes(gen, class, None).map(ObjectNode::into_node);
    };
    if let Some(schema) = annotated_return(gen, method, &scope, &site)? {
        return Ok(schema);
    }

    let keys = gen.source().returned_literal_keys(method.body());
    let keys = if keys.is_empty() { None } else { Some(keys) };
    resource_attributes(gen, class, keys).map(ObjectNode::into_node)
}

fn attribute_resource_schema(gen: &mut SchemaGenerator<'_>, fq: &str) -> Result<SchemaNode> {
    let class = locate(gen, fq)?;
    let scope = Scope::of_class(class);
    let site = format!("{}::toAttributes", class.name);
    let method = gen.find_method(class, "toAttributes");

    let annotated = match method {
        Some(method) => annotated_return(gen, method, &scope, &site)?,
        None => None,
    };
    let attributes = match annotated {
        Some(schema) => schema,
        None => {
            let mut names = class
                .field("attributes")
                .and_then(|field| field.default.as_deref())
                .and_then(|text| gen.source().initializer(text))
                .map(|expr| match expr {
                    Expr::Array(items) => string_values(&items),
                    _ => Vec::new(),
                })
                .unwrap_or_default();
            if let Some(method) = method {
                for key in gen.source().returned_literal_keys(method.body()) {
                    if !names.contains(&key) {
                        names.push(key);
                    }
                }
            }
            let names = if names.is_empty() { None } else { Some(names) };
            resource_attributes(gen, class, names)?.into_node()
        }
    };

    Ok(ObjectNode::new()
        .with_property("id", SchemaNode::string(), true)
        .with_property("attributes", attributes, true)
        .into_node())
}

/// Schema of an explicit, non-bare `@return` annotation.
fn annotated_return(
    gen: &mut SchemaGenerator<'_>,
    method: &MethodDescriptor,
    scope: &Scope,
    site: &str,
) -> Result<Option<SchemaNode>> {
    let doc = method.doc_block();
    let Some(text) = doc.return_type() else {
        return Ok(None);
    };
    let ty = TypeDescriptor::parse(text).map_err(|_| Error::unknown_type(site, text))?;
    if let TypeDescriptor::Named(name) = &ty {
        if matches!(name.to_ascii_lowercase().as_str(), "array" | "iterable" | "mixed") {
            return Ok(None);
        }
    }
    gen.classify(&ty, scope, site).map(Some)
}

/// The backing entity's fields named by `keys`, in that order. Names the
/// entity does not have are dropped; `None` keeps every field.
pub fn resource_attributes(
    gen: &mut SchemaGenerator<'_>,
    class: &ClassDescriptor,
    keys: Option<Vec<String>>,
) -> Result<ObjectNode> {
    let Some(entity) = backing_entity(gen, class) else {
        return Err(Error::UnresolvableStructure {
            class: class.name.clone(),
            member: "toArray".to_string(),
        });
    };

    let schema = class_resolver::resolve_class(gen, &entity, false, false)?;
    let Some(source) = schema.as_object() else {
        return Err(Error::UnresolvableStructure {
            class: class.name.clone(),
            member: "toArray".to_string(),
        });
    };

    let Some(keys) = keys else {
        return Ok(source.clone());
    };
    let mut object = ObjectNode::new();
    for key in keys {
        match source.properties.get(&key) {
            Some(schema) => object.insert(&key, schema.clone(), source.required.contains(&key)),
            None => debug!("{} is not a field of {}, dropping it from {}", key, entity, class.name),
        }
    }
    Ok(object)
}

/// Entity a resource wraps, named by `@mixin`, then `@property`, then
/// `@property-read`.
pub(crate) fn backing_entity(gen: &SchemaGenerator<'_>, class: &ClassDescriptor) -> Option<String> {
    let doc = class.doc_block();
    let scope = Scope::of_class(class);
    let properties = doc.properties();

    let candidates = doc
        .mixins()
        .into_iter()
        .map(str::to_string)
        .chain(properties.iter().filter(|p| !p.read_only).map(|p| p.ty.clone()))
        .chain(properties.iter().filter(|p| p.read_only).map(|p| p.ty.clone()));

    for text in candidates {
        let Ok(ty) = TypeDescriptor::parse(&text) else {
            continue;
        };
        let (members, _) = ty.members();
        for member in members {
            let Some(name) = member.base_name() else {
                continue;
            };
            if let Ok(fq) = gen.types.resolve_class_name(name, &scope, &class.name) {
                if gen.provider().class(&fq).is_some() {
                    return Some(fq);
                }
            }
        }
    }
    None
}

fn locate<'p>(gen: &SchemaGenerator<'p>, fq: &str) -> Result<&'p ClassDescriptor> {
    gen.provider().class(fq).ok_or_else(|| Error::UnlocatableClass {
        name: fq.to_string(),
        context: "resource resolution".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnownTypes;
    use crate::metadata::manifest_from_yaml;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
classes:
  - name: App\Models\User
    parents: [Illuminate\Database\Eloquent\Model]
  - name: App\Http\Resources\UserResource
    parents: [Illuminate\Http\Resources\Json\JsonResource]
    doc: "/** @mixin \\App\\Models\\User */"
    methods:
      - name: toArray
        params: [{name: request}]
        body: |
          return [
              'id' => $this->id,
              'name' => $this->name,
              'nickname' => $this->nickname,
          ];
  - name: App\Http\Resources\ProfileResource
    parents: [Illuminate\Http\Resources\Json\JsonResource]
    imports:
      User: App\Models\User
    doc: "/** @property User $resource */"
  - name: App\Http\Resources\StatsResource
    parents: [Illuminate\Http\Resources\Json\JsonResource]
    methods:
      - name: toArray
        doc: "/** @return array{visits: int, ratio?: float} */"
        body: "return ['visits' => $this->visits];"
  - name: App\Http\Resources\OrphanResource
    parents: [Illuminate\Http\Resources\Json\JsonResource]
    methods:
      - name: toArray
        body: "return ['id' => $this->id];"
  - name: App\Http\Resources\UserCollection
    parents:
      - Illuminate\Http\Resources\Json\ResourceCollection
      - Illuminate\Http\Resources\Json\JsonResource
  - name: App\Http\Resources\MemberCollection
    parents: [Illuminate\Http\Resources\Json\ResourceCollection]
    fields:
      - name: collects
        default: "ProfileResource::class"
  - name: App\JsonApi\UserApiResource
    parents: [TiMacDonald\JsonApi\JsonApiResource]
    doc: "/** @mixin \\App\\Models\\User */"
    fields:
      - name: attributes
        default: "['name']"
    methods:
      - name: toAttributes
        body: "return ['email' => $this->email];"
tables:
  - name: users
    columns:
      - {name: id, type_name: bigint}
      - {name: name, type_name: varchar(255)}
      - {name: email, type_name: varchar(255), nullable: true}
"#;

    fn resolve(fq: &str) -> (SchemaNode, indexmap::IndexMap<String, SchemaNode>) {
        let manifest = manifest_from_yaml(MANIFEST);
        let known = KnownTypes::default();
        let mut gen = SchemaGenerator::new(&manifest, &known);
        let schema = gen.classify_str(fq, &Scope::global(), "test").unwrap();
        (schema, gen.finish().unwrap())
    }

    #[test]
    fn test_attributes_from_returned_keys() {
        let (schema, components) = resolve("\\App\\Http\\Resources\\UserResource");
        assert_eq!(schema, SchemaNode::reference("UserResource"));

        let object = components["UserResource"].as_object().unwrap();
        assert_eq!(object.properties.keys().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(object.properties["id"], SchemaNode::integer());
        assert_eq!(object.required.iter().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn test_whole_entity_without_transformation() {
        let (_, components) = resolve("\\App\\Http\\Resources\\ProfileResource");
        let object = components["ProfileResource"].as_object().unwrap();
        assert_eq!(object.properties.keys().collect::<Vec<_>>(), vec!["id", "name", "email"]);
        assert_eq!(object.properties["email"], SchemaNode::string().with_nullable(true));
    }

    #[test]
    fn test_annotation_wins_over_inference() {
        let (_, components) = resolve("\\App\\Http\\Resources\\StatsResource");
        let expected = ObjectNode::new()
            .with_property("visits", SchemaNode::int32(), true)
            .with_property("ratio", SchemaNode::float(), false)
            .into_node();
        assert_eq!(components["StatsResource"], expected);
    }

    #[test]
    fn test_missing_backing_entity() {
        let manifest = manifest_from_yaml(MANIFEST);
        let known = KnownTypes::default();
        let mut gen = SchemaGenerator::new(&manifest, &known);
        gen.classify_str("\\App\\Http\\Resources\\OrphanResource", &Scope::global(), "test")
            .unwrap();

        let err = gen.finish().unwrap_err();
        assert!(matches!(err, Error::UnresolvableStructure { ref class, .. } if class.ends_with("OrphanResource")));
    }

    #[test]
    fn test_collection_items_by_convention() {
        let (schema, components) = resolve("\\App\\Http\\Resources\\UserCollection");
        assert_eq!(schema, SchemaNode::array(SchemaNode::reference("UserResource")));
        assert!(components.contains_key("UserResource"));
    }

    #[test]
    fn test_collection_items_from_collects() {
        let (schema, _) = resolve("\\App\\Http\\Resources\\MemberCollection");
        assert_eq!(schema, SchemaNode::array(SchemaNode::reference("ProfileResource")));
    }

    #[test]
    fn test_attribute_resource() {
        let (schema, components) = resolve("\\App\\JsonApi\\UserApiResource");
        assert_eq!(schema, SchemaNode::reference("UserApiResource"));

        let attributes = ObjectNode::new()
            .with_property("name", SchemaNode::string(), true)
            .with_property("email", SchemaNode::string().with_nullable(true), true)
            .into_node();
        let expected = ObjectNode::new()
            .with_property("id", SchemaNode::string(), true)
            .with_property("attributes", attributes, true)
            .into_node();
        assert_eq!(components["UserApiResource"], expected);
    }

    #[test]
    fn test_wrap_data() {
        let wrapped = wrap_data(SchemaNode::reference("UserResource"));
        let object = wrapped.as_object().unwrap();
        assert_eq!(object.properties["data"], SchemaNode::reference("UserResource"));
        assert!(object.required.contains("data"));
    }
}
