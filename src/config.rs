//! Generator configuration.
//!
//! Loaded from a YAML (or JSON) file. Every section has a default, so a missing
//! file or an empty document yields a working configuration for a stock
//! Laravel application.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// HTTP methods never documented
    pub ignored_methods: Vec<String>,
    /// Route name prefixes never documented
    pub ignored_route_names: Vec<String>,
    /// Return types skipped while resolving response schemas
    pub ignored_route_returns: Vec<String>,
    /// Output targets, generated in order
    pub route_prefixes: Vec<RoutePrefixGroup>,
    pub known_types: KnownTypes,
}

/// One partition of the route table producing one artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePrefixGroup {
    #[serde(rename = "match", default)]
    pub match_kind: MatchKind,
    pub value: String,
    /// Output file, relative to the output directory
    pub output: String,
    #[serde(default)]
    pub writer: WriterKind,
    #[serde(default)]
    pub options: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    #[default]
    Uri,
    Controller,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriterKind {
    #[default]
    Openapi,
    OpenapiYaml,
    Typescript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationArity {
    Single,
    Multiple,
}

/// Framework identities behind every "kind of" check.
///
/// A class matches a list when it, or any of its recorded ancestors, is listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownTypes {
    pub entity: Vec<String>,
    pub date_time: Vec<String>,
    pub uploaded_file: Vec<String>,
    pub validated_input: Vec<String>,
    pub request: Vec<String>,
    pub json_resource: Vec<String>,
    pub resource_collection: Vec<String>,
    pub attribute_resource: Vec<String>,
    pub attribute_resource_collection: Vec<String>,
    pub collection: Vec<String>,
    pub data_collection: Vec<String>,
    pub paginated_data_collection: Vec<String>,
    pub cursor_paginated_data_collection: Vec<String>,
    pub paginator: Vec<String>,
    pub length_aware_paginator: Vec<String>,
    pub cursor_paginator: Vec<String>,
    /// Relation class → arity
    pub relations: IndexMap<String, RelationArity>,
    /// Relation-building method name → arity
    pub relation_calls: IndexMap<String, RelationArity>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for KnownTypes {
    fn default() -> Self {
        use RelationArity::{Multiple, Single};

        let relations = [
            ("HasOne", Single),
            ("HasOneThrough", Single),
            ("BelongsTo", Single),
            ("MorphOne", Single),
            ("MorphTo", Single),
            ("HasMany", Multiple),
            ("HasManyThrough", Multiple),
            ("BelongsToMany", Multiple),
            ("MorphMany", Multiple),
            ("MorphToMany", Multiple),
        ]
        .into_iter()
        .map(|(name, arity)| (format!("Illuminate\\Database\\Eloquent\\Relations\\{}", name), arity))
        .collect();

        let relation_calls = [
            ("hasOne", Single),
            ("hasOneThrough", Single),
            ("belongsTo", Single),
            ("morphOne", Single),
            ("hasMany", Multiple),
            ("hasManyThrough", Multiple),
            ("belongsToMany", Multiple),
            ("morphMany", Multiple),
            ("morphToMany", Multiple),
            ("morphedByMany", Multiple),
        ]
        .into_iter()
        .map(|(name, arity)| (name.to_string(), arity))
        .collect();

        Self {
            entity: strings(&["Illuminate\\Database\\Eloquent\\Model"]),
            date_time: strings(&["DateTimeInterface", "DateTime", "DateTimeImmutable", "Carbon\\CarbonInterface"]),
            uploaded_file: strings(&[
                "Illuminate\\Http\\UploadedFile",
                "Symfony\\Component\\HttpFoundation\\File\\UploadedFile",
            ]),
            validated_input: strings(&["Illuminate\\Foundation\\Http\\FormRequest"]),
            request: strings(&["Illuminate\\Http\\Request"]),
            json_resource: strings(&["Illuminate\\Http\\Resources\\Json\\JsonResource"]),
            resource_collection: strings(&[
                "Illuminate\\Http\\Resources\\Json\\ResourceCollection",
                "Illuminate\\Http\\Resources\\Json\\AnonymousResourceCollection",
            ]),
            attribute_resource: strings(&["TiMacDonald\\JsonApi\\JsonApiResource"]),
            attribute_resource_collection: strings(&["TiMacDonald\\JsonApi\\JsonApiResourceCollection"]),
            collection: strings(&[
                "Illuminate\\Support\\Enumerable",
                "Illuminate\\Support\\Collection",
                "Illuminate\\Database\\Eloquent\\Collection",
            ]),
            data_collection: strings(&["Spatie\\LaravelData\\DataCollection"]),
            paginated_data_collection: strings(&["Spatie\\LaravelData\\PaginatedDataCollection"]),
            cursor_paginated_data_collection: strings(&["Spatie\\LaravelData\\CursorPaginatedDataCollection"]),
            paginator: strings(&[
                "Illuminate\\Contracts\\Pagination\\Paginator",
                "Illuminate\\Pagination\\Paginator",
            ]),
            length_aware_paginator: strings(&[
                "Illuminate\\Contracts\\Pagination\\LengthAwarePaginator",
                "Illuminate\\Pagination\\LengthAwarePaginator",
            ]),
            cursor_paginator: strings(&[
                "Illuminate\\Contracts\\Pagination\\CursorPaginator",
                "Illuminate\\Pagination\\CursorPaginator",
            ]),
            relations,
            relation_calls,
        }
    }
}

impl KnownTypes {
    /// Every identity listed anywhere, used to accept framework classes the
    /// manifest does not describe.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        [
            &self.entity,
            &self.date_time,
            &self.uploaded_file,
            &self.validated_input,
            &self.request,
            &self.json_resource,
            &self.resource_collection,
            &self.attribute_resource,
            &self.attribute_resource_collection,
            &self.collection,
            &self.data_collection,
            &self.paginated_data_collection,
            &self.cursor_paginated_data_collection,
            &self.paginator,
            &self.length_aware_paginator,
            &self.cursor_paginator,
        ]
        .into_iter()
        .flatten()
        .chain(self.relations.keys())
    }

    pub fn is_known(&self, fq: &str) -> bool {
        self.all().any(|known| known == fq)
    }

    /// The resource base identities, which carry no item information by themselves.
    pub fn resource_bases(&self) -> impl Iterator<Item = &String> {
        self.json_resource
            .iter()
            .chain(&self.resource_collection)
            .chain(&self.attribute_resource)
            .chain(&self.attribute_resource_collection)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            ignored_methods: strings(&["head", "options"]),
            ignored_route_names: strings(&["api.openapi.", "api.not_found"]),
            ignored_route_returns: strings(&["Illuminate\\Http\\RedirectResponse"]),
            route_prefixes: vec![RoutePrefixGroup {
                match_kind: MatchKind::Uri,
                value: "api".to_string(),
                output: "openapi.json".to_string(),
                writer: WriterKind::Openapi,
                options: [
                    ("openapi", "3.0.2"),
                    ("title", "OpenAPI"),
                    ("version", "1.0.0"),
                ]
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            }],
            known_types: KnownTypes::default(),
        }
    }
}

impl GeneratorConfig {
    /// Reads a configuration file. JSON documents are accepted as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        let config: GeneratorConfig = serde_yaml::from_str(&content)
            .map_err(|err| Error::Config(format!("{}: {}", path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`GeneratorConfig::load`], falling back to defaults when the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                info!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        for group in &self.route_prefixes {
            if group.output.trim().is_empty() {
                return Err(Error::Config(format!(
                    "route prefix group `{}` has no output location",
                    group.value
                )));
            }
        }
        Ok(())
    }

    pub fn is_ignored_method(&self, method: &str) -> bool {
        self.ignored_methods
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(method))
    }

    pub fn is_ignored_route_name(&self, name: &str) -> bool {
        self.ignored_route_names
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}
