use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the generation pipeline.
///
/// The first six variants are fatal static-analysis failures: they abort the
/// generation of the current output target. The remaining ones cover reading
/// manifests, configuration and serialization.
#[derive(Debug, Error)]
pub enum Error {
    /// A route handler is neither a class method reference nor a closure.
    #[error("unknown handler for route {route}")]
    UnknownHandler { route: String },

    /// A native or documented type descriptor matched no classification rule.
    #[error("cannot understand type `{descriptor}` ({site})")]
    UnknownType { site: String, descriptor: String },

    /// A declarative class member produced no schema and has no documentation fallback.
    #[error("cannot understand class structure - {class}::{member}")]
    UnresolvableStructure { class: String, member: String },

    /// A bare class name could not be mapped to a fully qualified identity.
    #[error("cannot locate class {name} (referenced from {context})")]
    UnlocatableClass { name: String, context: String },

    /// A generic/collection annotation wraps a class with no envelope rule.
    #[error("cannot understand collection type {name} ({class})")]
    UnrecognizedCollectionType { name: String, class: String },

    /// A schema reference points at a component that was never registered.
    #[error("schema reference to unregistered component {name}")]
    DanglingReference { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {}: {message}", file.display())]
    Parse { file: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn unknown_type(site: &str, descriptor: impl ToString) -> Self {
        Error::UnknownType {
            site: site.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}
