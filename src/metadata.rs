//! Class, method and storage metadata.
//!
//! The engine never inspects a running application. Everything it knows about
//! classes and tables comes through [`MetadataProvider`]; [`ProjectManifest`] is
//! the provider backed by manifest files exported from the application.

use crate::docblock::DocBlock;
use crate::extractor::RouteDefinition;
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// Reflection data for one class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassDescriptor {
    /// Fully qualified name, without a leading backslash
    pub name: String,
    /// Every ancestor class and implemented interface, fully qualified
    pub parents: Vec<String>,
    /// `use` imports: alias → fully qualified name
    pub imports: IndexMap<String, String>,
    pub doc: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
    /// Explicit persisted-entity settings
    pub entity: Option<EntitySettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub doc: Option<String>,
    /// Initialiser source text
    pub default: Option<String>,
    pub visibility: Visibility,
    #[serde(rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodDescriptor {
    pub name: String,
    pub visibility: Visibility,
    #[serde(rename = "static")]
    pub is_static: bool,
    pub params: Vec<ParamDescriptor>,
    pub return_type: Option<String>,
    pub doc: Option<String>,
    /// Body source text
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Option<String>,
}

/// Persisted-entity overrides. Anything left out is recovered from source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySettings {
    pub table: Option<String>,
    pub connection: Option<String>,
    pub hidden: Vec<String>,
    pub casts: IndexMap<String, String>,
}

/// Column catalogue of one storage table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDescriptor {
    pub connection: Option<String>,
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
}

impl ClassDescriptor {
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn namespace(&self) -> &str {
        self.name.rsplit_once('\\').map(|(ns, _)| ns).unwrap_or("")
    }

    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }

    pub fn doc_block(&self) -> DocBlock {
        self.doc.as_deref().map(DocBlock::parse).unwrap_or_default()
    }
}

impl MethodDescriptor {
    pub fn doc_block(&self) -> DocBlock {
        self.doc.as_deref().map(DocBlock::parse).unwrap_or_default()
    }

    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

impl FieldDescriptor {
    pub fn doc_block(&self) -> DocBlock {
        self.doc.as_deref().map(DocBlock::parse).unwrap_or_default()
    }
}

/// Last segment of a backslash-separated name.
pub fn short_name(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

/// Strips the leading backslash of a fully qualified name.
pub fn normalize_name(name: &str) -> &str {
    name.trim_start_matches('\\')
}

/// Source of class and storage metadata.
pub trait MetadataProvider {
    fn class(&self, name: &str) -> Option<&ClassDescriptor>;

    fn columns(&self, connection: Option<&str>, table: &str) -> Option<&[ColumnDescriptor]>;

    fn fields(&self, class: &str) -> &[FieldDescriptor] {
        self.class(class).map(|c| c.fields.as_slice()).unwrap_or(&[])
    }

    fn method(&self, class: &str, name: &str) -> Option<&MethodDescriptor> {
        self.class(class).and_then(|c| c.method(name))
    }

    fn documentation(&self, text: Option<&str>) -> DocBlock {
        text.map(DocBlock::parse).unwrap_or_default()
    }
}

/// One manifest file's content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestFragment {
    pub routes: Vec<RouteDefinition>,
    pub classes: Vec<ClassDescriptor>,
    pub tables: Vec<TableDescriptor>,
}

/// Merged metadata of a whole project
#[derive(Debug, Clone, Default)]
pub struct ProjectManifest {
    pub routes: Vec<RouteDefinition>,
    pub classes: IndexMap<String, ClassDescriptor>,
    /// Keyed by `(connection, table)`
    pub tables: IndexMap<(Option<String>, String), TableDescriptor>,
}

impl ProjectManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fragment; a class or table seen before is replaced.
    pub fn merge(&mut self, fragment: ManifestFragment) {
        self.routes.extend(fragment.routes);

        for mut class in fragment.classes {
            class.name = normalize_name(&class.name).to_string();
            if self.classes.contains_key(&class.name) {
                warn!("Class {} declared more than once, keeping the last declaration", class.name);
            }
            self.classes.insert(class.name.clone(), class);
        }

        for table in fragment.tables {
            let key = (table.connection.clone(), table.name.clone());
            if self.tables.contains_key(&key) {
                warn!("Table {} declared more than once, keeping the last declaration", table.name);
            }
            self.tables.insert(key, table);
        }
    }
}

impl MetadataProvider for ProjectManifest {
    fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(normalize_name(name))
    }

    fn columns(&self, connection: Option<&str>, table: &str) -> Option<&[ColumnDescriptor]> {
        let key = (connection.map(str::to_string), table.to_string());
        self.tables
            .get(&key)
            .or_else(|| {
                // a table declared without connection serves every connection
                self.tables.get(&(None, table.to_string()))
            })
            .map(|table| table.columns.as_slice())
    }
}


/// Builds a manifest from one YAML fragment.
#[cfg(test)]
pub(crate) fn manifest_from_yaml(yaml: &str) -> ProjectManifest {
    let fragment: ManifestFragment = serde_yaml::from_str(yaml).unwrap();
    let mut manifest = ProjectManifest::new();
    manifest.merge(fragment);
    manifest
}
