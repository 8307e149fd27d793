//! Writers turning a [`Spec`] into an output document.
//!
//! Three writers exist: OpenAPI as pretty-printed JSON, OpenAPI as YAML, and
//! TypeScript type declarations. [`writer_for`] picks one for a configured
//! route-prefix group.

use crate::config::WriterKind;
use crate::error::Result;
use crate::openapi_builder::{Info, OpenApiDocument, Spec, JSON_CONTENT};
use crate::schema::{PrimitiveKind, SchemaNode};
use anyhow::Context;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Renders a finished spec.
pub trait Writer {
    fn output(&self, spec: &Spec) -> Result<String>;
}

/// Builds the writer for a group. Missing options fall back to
/// `openapi: 3.0.2`, `title: OpenAPI`, `version: 1.0.0`.
pub fn writer_for(kind: WriterKind, options: &IndexMap<String, String>) -> Box<dyn Writer> {
    match kind {
        WriterKind::Openapi => Box::new(OpenApiWriter::from_options(OpenApiFormat::Json, options)),
        WriterKind::OpenapiYaml => Box::new(OpenApiWriter::from_options(OpenApiFormat::Yaml, options)),
        WriterKind::Typescript => Box::new(TypeScriptWriter),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenApiFormat {
    Json,
    Yaml,
}

/// OpenAPI document writer
#[derive(Debug, Clone)]
pub struct OpenApiWriter {
    pub format: OpenApiFormat,
    pub openapi: String,
    pub info: Info,
}

impl OpenApiWriter {
    pub fn from_options(format: OpenApiFormat, options: &IndexMap<String, String>) -> Self {
        let option = |key: &str, default: &str| options.get(key).cloned().unwrap_or_else(|| default.to_string());
        Self {
            format,
            openapi: option("openapi", "3.0.2"),
            info: Info {
                title: option("title", "OpenAPI"),
                version: option("version", "1.0.0"),
            },
        }
    }
}

impl Writer for OpenApiWriter {
    fn output(&self, spec: &Spec) -> Result<String> {
        let document = OpenApiDocument {
            openapi: self.openapi.clone(),
            info: self.info.clone(),
            paths: &spec.paths,
            components: &spec.components,
        };
        match self.format {
            OpenApiFormat::Json => {
                debug!("Serializing OpenAPI document to JSON");
                Ok(serde_json::to_string_pretty(&document)?)
            }
            OpenApiFormat::Yaml => {
                debug!("Serializing OpenAPI document to YAML");
                Ok(serde_yaml::to_string(&document)?)
            }
        }
    }
}

/// TypeScript declarations writer.
///
/// Emits one `export type` per component, dependencies first, then one type
/// and one `route_` constant per operation. An operation without a JSON
/// success body is typed `void`. Each identifier is declared once; later
/// operations sharing an id are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeScriptWriter;

impl Writer for TypeScriptWriter {
    fn output(&self, spec: &Spec) -> Result<String> {
        debug!("Rendering TypeScript declarations");
        let mut out = String::new();
        let mut declared: HashSet<String> = HashSet::new();

        for name in emission_order(&spec.components.schemas) {
            let schema = &spec.components.schemas[name];
            let identifier = ts_identifier(name);
            let _ = writeln!(out, "export type {} = {};\n", identifier, ts_type(schema, 0));
            declared.insert(identifier);
        }

        for (path, method, operation) in spec.operations() {
            let identifier = ts_identifier(&operation.operation_id);
            if !declared.insert(identifier.clone()) {
                debug!("Skipping {} {}: {} is already declared", method, path, identifier);
                continue;
            }
            let body = operation
                .responses
                .get("200")
                .and_then(|response| response.content.get(JSON_CONTENT))
                .map_or_else(|| "void".to_string(), |media| ts_type(&media.schema, 0));
            let _ = writeln!(out, "export type {} = {};", identifier, body);
            let _ = writeln!(
                out,
                "export const route_{} = '{}';\n",
                identifier,
                operation.operation_id.replace('\'', "\\'")
            );
        }
        Ok(out)
    }
}

/// Component names with every dependency before its dependents. When only
/// cycles remain, the rest is emitted in registration order.
fn emission_order(components: &IndexMap<String, SchemaNode>) -> Vec<&str> {
    let dependencies: IndexMap<&str, IndexSet<String>> = components
        .iter()
        .map(|(name, schema)| {
            let mut references = IndexSet::new();
            schema.collect_references(&mut references);
            references.shift_remove(name);
            (name.as_str(), references)
        })
        .collect();

    let mut emitted: IndexSet<&str> = IndexSet::new();
    while emitted.len() < dependencies.len() {
        let ready: Vec<&str> = dependencies
            .iter()
            .filter(|(name, deps)| {
                !emitted.contains(*name)
                    && deps
                        .iter()
                        .all(|dep| emitted.contains(dep.as_str()) || !dependencies.contains_key(dep.as_str()))
            })
            .map(|(name, _)| *name)
            .collect();

        if ready.is_empty() {
            debug!("Breaking a reference cycle between {} components", dependencies.len() - emitted.len());
            let rest: Vec<&str> = dependencies
                .keys()
                .copied()
                .filter(|name| !emitted.contains(name))
                .collect();
            emitted.extend(rest);
            break;
        }
        emitted.extend(ready);
    }
    emitted.into_iter().collect()
}

fn ts_type(schema: &SchemaNode, depth: usize) -> String {
    let rendered = match schema {
        SchemaNode::Primitive(node) => match (node.kind, node.format.as_deref()) {
            (PrimitiveKind::String, Some("binary")) => "File".to_string(),
            (PrimitiveKind::String, _) => "string".to_string(),
            (PrimitiveKind::Integer | PrimitiveKind::Number, _) => "number".to_string(),
            (PrimitiveKind::Boolean, _) => "boolean".to_string(),
        },
        SchemaNode::Object(node) if node.properties.is_empty() => "Record<string, unknown>".to_string(),
        SchemaNode::Object(node) => {
            let indent = "  ".repeat(depth + 1);
            let mut body = String::from("{\n");
            for (name, property) in &node.properties {
                let optional = if node.required.contains(name) { "" } else { "?" };
                let _ = writeln!(
                    body,
                    "{}{}{}: {};",
                    indent,
                    ts_property_name(name),
                    optional,
                    ts_type(property, depth + 1)
                );
            }
            body.push_str(&"  ".repeat(depth));
            body.push('}');
            body
        }
        SchemaNode::Array(node) => format!("Array<{}>", ts_type(&node.items, depth)),
        SchemaNode::Ref(node) => ts_identifier(&node.target),
        SchemaNode::OneOf(node) => node
            .variants
            .iter()
            .map(|variant| ts_type(variant, depth))
            .collect::<Vec<_>>()
            .join(" | "),
    };
    if schema.is_nullable() {
        format!("{} | null", rendered)
    } else {
        rendered
    }
}

fn ts_identifier(name: &str) -> String {
    let mut identifier: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if identifier.starts_with(|c: char| c.is_ascii_digit()) {
        identifier.insert(0, '_');
    }
    identifier
}

fn ts_property_name(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "\\'"))
    }
}

/// Writes string content to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does.
/// Parent directories are created as needed.
pub fn write_to_file(content: &str, path: &Path) -> anyhow::Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi_builder::{Components, MediaType, Operation, Response};
    use crate::schema::ObjectNode;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Helper building a spec with one operation and a small component graph
    fn create_test_spec() -> Spec {
        let mut schemas = IndexMap::new();
        schemas.insert(
            "Post".to_string(),
            ObjectNode::new()
                .with_property("title", SchemaNode::string(), true)
                .with_property("author", SchemaNode::reference("User").with_nullable(true), false)
                .into_node(),
        );
        schemas.insert(
            "User".to_string(),
            ObjectNode::new()
                .with_property("id", SchemaNode::integer(), true)
                .with_property("display-name", SchemaNode::string(), true)
                .into_node(),
        );

        let mut operation = Operation {
            operation_id: "api.posts.index".to_string(),
            ..Default::default()
        };
        operation.responses.insert(
            "200".to_string(),
            Response::with_content("index", MediaType::of(SchemaNode::array(SchemaNode::reference("Post")))),
        );
        let mut spec = Spec {
            components: Components { schemas },
            ..Default::default()
        };
        spec.paths
            .entry("/api/posts".to_string())
            .or_default()
            .insert("get".to_string(), operation);
        spec
    }

    #[test]
    fn test_openapi_json() {
        let writer = writer_for(WriterKind::Openapi, &IndexMap::new());
        let json = writer.output(&create_test_spec()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["openapi"], "3.0.2");
        assert_eq!(parsed["info"]["title"], "OpenAPI");
        assert_eq!(
            parsed["paths"]["/api/posts"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]
                ["items"]["$ref"],
            "#/components/schemas/Post"
        );
        assert!(json.contains("\"/api/posts\""), "slashes stay unescaped");
        assert!(json.lines().count() > 5, "pretty printed");
    }

    #[test]
    fn test_openapi_yaml_with_options() {
        let options: IndexMap<String, String> = [("title", "Shop API"), ("version", "2.1.0")]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let writer = writer_for(WriterKind::OpenapiYaml, &options);
        let yaml = writer.output(&create_test_spec()).unwrap();

        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["info"]["title"].as_str(), Some("Shop API"));
        assert_eq!(parsed["info"]["version"].as_str(), Some("2.1.0"));
        assert_eq!(parsed["openapi"].as_str(), Some("3.0.2"));
        assert!(parsed["components"]["schemas"]["User"].is_mapping());
    }

    #[test]
    fn test_typescript_declarations() {
        let ts = TypeScriptWriter.output(&create_test_spec()).unwrap();

        let expected = "\
export type User = {
  id: number;
  'display-name': string;
};

export type Post = {
  title: string;
  author?: User | null;
};

export type api_posts_index = Array<Post>;
export const route_api_posts_index = 'api.posts.index';

";
        assert_eq!(ts, expected);
    }

    #[test]
    fn test_typescript_void_and_repeated_ids() {
        let mut spec = create_test_spec();
        let mut redirect = Operation {
            operation_id: "api.posts.redirect".to_string(),
            ..Default::default()
        };
        redirect
            .responses
            .insert("200".to_string(), Response::new("redirect"));
        let mut repeated = Operation {
            operation_id: "api.posts.index".to_string(),
            ..Default::default()
        };
        repeated.responses.insert(
            "200".to_string(),
            Response::with_content("index", MediaType::of(SchemaNode::string())),
        );
        let methods = spec.paths.entry("/api/posts".to_string()).or_default();
        methods.insert("post".to_string(), redirect);
        methods.insert("put".to_string(), repeated);

        let ts = TypeScriptWriter.output(&spec).unwrap();
        assert!(ts.ends_with(
            "\
export type api_posts_index = Array<Post>;
export const route_api_posts_index = 'api.posts.index';

export type api_posts_redirect = void;
export const route_api_posts_redirect = 'api.posts.redirect';

"
        ));
        assert_eq!(ts.matches("export type api_posts_index").count(), 1);
    }

    #[test]
    fn test_emission_order_breaks_cycles() {
        let mut schemas = IndexMap::new();
        schemas.insert("A".to_string(), SchemaNode::array(SchemaNode::reference("B")));
        schemas.insert("B".to_string(), SchemaNode::array(SchemaNode::reference("A")));
        schemas.insert("C".to_string(), SchemaNode::array(SchemaNode::reference("C")));
        schemas.insert("D".to_string(), SchemaNode::array(SchemaNode::reference("A")));

        assert_eq!(emission_order(&schemas), vec!["C", "A", "B", "D"]);
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("subdir").join("nested").join("openapi.json");

        write_to_file("initial content", &file_path).unwrap();
        write_to_file("new content", &file_path).unwrap();

        let read_content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(read_content, "new content");
    }
}
