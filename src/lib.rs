//! Route Schema Generator - OpenAPI documents from web application route and class metadata.
//!
//! The library reads manifests exported from a web application (its route
//! table, class reflection data and storage table catalogue) and folds the type
//! signals found there into one schema graph with named, deduplicated
//! components.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Recursively scans a project directory for manifest files
//! 2. [`parser`] - Parses and merges manifests into a [`metadata::ProjectManifest`]
//! 3. [`extractor`] - Selects the routes of one configured output target
//! 4. [`operation`] - Builds one OpenAPI operation per route and HTTP method
//! 5. [`schema_generator`] - Classifies type descriptors into [`schema::SchemaNode`]s
//! 6. [`class_resolver`], [`model_resolver`], [`resource`] - Object shapes of
//!    declarative classes, persisted entities and API resources
//! 7. [`registry`] - Lazily resolved named components
//! 8. [`openapi_builder`] - Assembles the spec of one target
//! 9. [`serializer`] - Writes the spec as OpenAPI JSON/YAML or TypeScript
//!
//! # Example Usage
//!
//! ```no_run
//! use route_schema_gen::{
//!     config::GeneratorConfig,
//!     openapi_builder::generate_spec,
//!     parser::ManifestParser,
//!     scanner::FileScanner,
//!     serializer::writer_for,
//! };
//! use std::path::PathBuf;
//!
//! let scan_result = FileScanner::new(PathBuf::from("./manifests")).scan().unwrap();
//! let project = ManifestParser::load_project(&scan_result.manifest_files).unwrap();
//! let config = GeneratorConfig::default();
//!
//! for group in &config.route_prefixes {
//!     let spec = generate_spec(&project, &project.routes, group, &config).unwrap();
//!     let output = writer_for(group.writer, &group.options).output(&spec).unwrap();
//!     println!("{}", output);
//! }
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod class_resolver;
pub mod cli;
pub mod config;
pub mod docblock;
pub mod envelope;
pub mod error;
pub mod extractor;
pub mod metadata;
pub mod model_resolver;
pub mod openapi_builder;
pub mod operation;
pub mod parser;
pub mod registry;
pub mod resource;
pub mod scanner;
pub mod schema;
pub mod schema_generator;
pub mod serializer;
pub mod source_query;
pub mod type_resolver;
