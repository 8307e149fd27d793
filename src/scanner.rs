use anyhow::Result;
use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Directories that never hold project manifests
const SKIPPED_DIRS: &[&str] = &["target", "vendor", "node_modules"];

/// Manifest extensions
const MANIFEST_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// File scanner for traversing project directories.
///
/// The `FileScanner` recursively walks through a project directory to find all
/// metadata manifests (`.json`, `.yaml`, `.yml`). It skips hidden directories
/// and the `target`, `vendor` and `node_modules` directories.
///
/// # Example
///
/// ```no_run
/// use route_schema_gen::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} manifests", result.manifest_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Discovered manifests, sorted by path
    pub manifest_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects every manifest file.
    ///
    /// Inaccessible entries are logged and recorded as warnings; scanning
    /// continues past them. Files come back sorted so that manifests merge in
    /// a stable order.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut manifest_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path).into_iter().filter_entry(|e| {
            // Don't filter the root directory itself
            if e.path() == self.root_path {
                return true;
            }
            let file_name = e.file_name().to_string_lossy();
            let is_hidden = file_name.starts_with('.');
            let is_skipped = e.file_type().is_dir() && SKIPPED_DIRS.contains(&file_name.as_ref());
            !is_hidden && !is_skipped
        }) {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    let is_manifest = path
                        .extension()
                        .and_then(|s| s.to_str())
                        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext));
                    if path.is_file() && is_manifest {
                        manifest_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        manifest_files.sort();
        Ok(ScanResult {
            manifest_files,
            warnings,
        })
    }
}
