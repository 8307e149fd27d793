//! Schema graph nodes.
//!
//! [`SchemaNode`] is the central entity every resolver produces. Named schemas
//! are never embedded by value: producers register them in the
//! [`SchemaRegistry`](crate::registry::SchemaRegistry) and hand out a
//! [`RefNode`] pointing at the component name instead.

use indexmap::{IndexMap, IndexSet};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Prefix used when a reference is rendered as an OpenAPI `$ref`.
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// Primitive JSON kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveNode {
    pub kind: PrimitiveKind,
    pub format: Option<String>,
    pub nullable: bool,
}

/// Object schema with ordered properties
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectNode {
    pub properties: IndexMap<String, SchemaNode>,
    pub required: IndexSet<String>,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayNode {
    pub items: Box<SchemaNode>,
    pub nullable: bool,
}

/// Weak reference to a registered component, by name.
#[derive(Debug, Clone, PartialEq)]
pub struct RefNode {
    pub target: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OneOfNode {
    pub variants: Vec<SchemaNode>,
    pub nullable: bool,
}

/// A node of the schema graph.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Primitive(PrimitiveNode),
    Object(ObjectNode),
    Array(ArrayNode),
    Ref(RefNode),
    OneOf(OneOfNode),
}

impl SchemaNode {
    fn primitive(kind: PrimitiveKind, format: Option<&str>) -> Self {
        SchemaNode::Primitive(PrimitiveNode {
            kind,
            format: format.map(str::to_string),
            nullable: false,
        })
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String, None)
    }

    /// String with a format hint such as `date-time` or `binary`.
    pub fn string_format(format: &str) -> Self {
        Self::primitive(PrimitiveKind::String, Some(format))
    }

    pub fn integer() -> Self {
        Self::primitive(PrimitiveKind::Integer, None)
    }

    pub fn int32() -> Self {
        Self::primitive(PrimitiveKind::Integer, Some("int32"))
    }

    pub fn number() -> Self {
        Self::primitive(PrimitiveKind::Number, None)
    }

    pub fn float() -> Self {
        Self::primitive(PrimitiveKind::Number, Some("float"))
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveKind::Boolean, None)
    }

    /// Object without any constraint.
    pub fn any_object() -> Self {
        SchemaNode::Object(ObjectNode::default())
    }

    pub fn array(items: SchemaNode) -> Self {
        SchemaNode::Array(ArrayNode {
            items: Box::new(items),
            nullable: false,
        })
    }

    pub fn reference(target: impl Into<String>) -> Self {
        SchemaNode::Ref(RefNode {
            target: target.into(),
            nullable: false,
        })
    }

    pub fn one_of(variants: Vec<SchemaNode>) -> Self {
        SchemaNode::OneOf(OneOfNode {
            variants,
            nullable: false,
        })
    }

    /// Builder-style variant of [`SchemaNode::set_nullable`].
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.set_nullable(nullable);
        self
    }

    pub fn set_nullable(&mut self, nullable: bool) {
        match self {
            SchemaNode::Primitive(node) => node.nullable = nullable,
            SchemaNode::Object(node) => node.nullable = nullable,
            SchemaNode::Array(node) => node.nullable = nullable,
            SchemaNode::Ref(node) => node.nullable = nullable,
            SchemaNode::OneOf(node) => node.nullable = nullable,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            SchemaNode::Primitive(node) => node.nullable,
            SchemaNode::Object(node) => node.nullable,
            SchemaNode::Array(node) => node.nullable,
            SchemaNode::Ref(node) => node.nullable,
            SchemaNode::OneOf(node) => node.nullable,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            SchemaNode::Object(node) => Some(node),
            _ => None,
        }
    }

    /// True when this node, or anything nested in it, is a `string`/`binary` primitive.
    pub fn contains_binary(&self) -> bool {
        match self {
            SchemaNode::Primitive(node) => {
                node.kind == PrimitiveKind::String && node.format.as_deref() == Some("binary")
            }
            SchemaNode::Object(node) => node.properties.values().any(SchemaNode::contains_binary),
            SchemaNode::Array(node) => node.items.contains_binary(),
            SchemaNode::Ref(_) => false,
            SchemaNode::OneOf(node) => node.variants.iter().any(SchemaNode::contains_binary),
        }
    }

    /// Collects the names of every component referenced from this node.
    pub fn collect_references(&self, out: &mut IndexSet<String>) {
        match self {
            SchemaNode::Primitive(_) => {}
            SchemaNode::Object(node) => {
                for property in node.properties.values() {
                    property.collect_references(out);
                }
            }
            SchemaNode::Array(node) => node.items.collect_references(out),
            SchemaNode::Ref(node) => {
                out.insert(node.target.clone());
            }
            SchemaNode::OneOf(node) => {
                for variant in &node.variants {
                    variant.collect_references(out);
                }
            }
        }
    }
}

impl ObjectNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property; `required` puts its name in the required set.
    pub fn with_property(mut self, name: &str, schema: SchemaNode, required: bool) -> Self {
        self.insert(name, schema, required);
        self
    }

    pub fn insert(&mut self, name: &str, schema: SchemaNode, required: bool) {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.insert(name.to_string());
        } else {
            self.required.shift_remove(name);
        }
    }

    /// Copies every property of `other` over this one, later entries winning.
    pub fn merge(&mut self, other: ObjectNode) {
        for (name, schema) in other.properties {
            let required = other.required.contains(&name);
            self.insert(&name, schema, required);
        }
    }

    pub fn into_node(self) -> SchemaNode {
        SchemaNode::Object(self)
    }
}

/// Folds several candidate schemas into one.
///
/// A single schema is returned as is (with `nullable` applied when requested),
/// several become a `oneOf` in the given order, and an empty input yields `None`.
pub fn merge_schemas(mut schemas: Vec<SchemaNode>, nullable: bool) -> Option<SchemaNode> {
    match schemas.len() {
        0 => None,
        1 => {
            let mut schema = schemas.pop()?;
            if nullable {
                schema.set_nullable(true);
            }
            Some(schema)
        }
        _ => Some(SchemaNode::OneOf(OneOfNode {
            variants: schemas,
            nullable,
        })),
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            SchemaNode::Primitive(node) => {
                map.serialize_entry("type", node.kind.as_str())?;
                if let Some(format) = &node.format {
                    map.serialize_entry("format", format)?;
                }
            }
            SchemaNode::Object(node) => {
                map.serialize_entry("type", "object")?;
                if !node.properties.is_empty() {
                    map.serialize_entry("properties", &node.properties)?;
                }
                if !node.required.is_empty() {
                    map.serialize_entry("required", &node.required)?;
                }
            }
            SchemaNode::Array(node) => {
                map.serialize_entry("type", "array")?;
                map.serialize_entry("items", &node.items)?;
            }
            SchemaNode::Ref(node) => {
                map.serialize_entry("$ref", &format!("{}{}", COMPONENTS_PREFIX, node.target))?;
            }
            SchemaNode::OneOf(node) => {
                map.serialize_entry("oneOf", &node.variants)?;
            }
        }
        if self.is_nullable() {
            map.serialize_entry("nullable", &true)?;
        }
        map.end()
    }
}
