use crate::error::{Error, Result};
use crate::metadata::{ManifestFragment, ProjectManifest};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Parser for metadata manifest files.
///
/// A manifest is a YAML or JSON document holding any of `routes`, `classes`
/// and `tables`. JSON files are read with the JSON parser, everything else
/// with the YAML one.
///
/// # Example
///
/// ```no_run
/// use route_schema_gen::parser::ManifestParser;
/// use std::path::Path;
///
/// let fragment = ManifestParser::parse_file(Path::new("manifest/routes.json")).unwrap();
/// println!("Parsed {} routes", fragment.routes.len());
/// ```
pub struct ManifestParser;

impl ManifestParser {
    /// Parses a single manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Parse`]
    /// if its content is not a valid manifest.
    pub fn parse_file(path: &Path) -> Result<ManifestFragment> {
        debug!("Parsing manifest: {}", path.display());

        let content = fs::read_to_string(path)?;
        let is_json = path.extension().and_then(|s| s.to_str()) == Some("json");
        let fragment = if is_json {
            serde_json::from_str(&content).map_err(|err| parse_error(path, err))?
        } else {
            serde_yaml::from_str(&content).map_err(|err| parse_error(path, err))?
        };

        debug!("Successfully parsed manifest: {}", path.display());
        Ok(fragment)
    }

    /// Parses every manifest, stopping at the first invalid one.
    pub fn parse_files(paths: &[PathBuf]) -> Result<Vec<ManifestFragment>> {
        debug!("Parsing {} manifests", paths.len());
        paths.iter().map(|path| Self::parse_file(path)).collect()
    }

    /// Parses and merges the manifests into one project, in the given order.
    pub fn load_project(paths: &[PathBuf]) -> Result<ProjectManifest> {
        let mut project = ProjectManifest::new();
        for fragment in Self::parse_files(paths)? {
            project.merge(fragment);
        }
        info!(
            "Loaded {} routes, {} classes and {} tables",
            project.routes.len(),
            project.classes.len(),
            project.tables.len()
        );
        Ok(project)
    }
}

fn parse_error(path: &Path, err: impl ToString) -> Error {
    Error::Parse {
        file: path.to_path_buf(),
        message: err.to_string(),
    }
}
