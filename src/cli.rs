use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;

/// Route Schema Generator - Generate OpenAPI documents and TypeScript declarations from route and class metadata
#[derive(Parser, Debug)]
#[command(name = "route-schema-gen")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the directory of metadata manifests
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Generator configuration file (YAML or JSON); defaults apply when omitted
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Directory the configured outputs are written to (defaults to the project path)
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!("Project path does not exist: {}", args.project_path.display());
    }

    if !args.project_path.is_dir() {
        anyhow::bail!("Project path is not a directory: {}", args.project_path.display());
    }

    if let Some(config) = &args.config_path {
        if !config.is_file() {
            anyhow::bail!("Configuration file does not exist: {}", config.display());
        }
    }

    info!("Project path: {}", args.project_path.display());
    match &args.config_path {
        Some(config) => info!("Configuration: {}", config.display()),
        None => info!("Configuration: defaults"),
    }

    Ok(args)
}

/// Run the main workflow
///
/// Output targets are generated one after another; the first failing target
/// stops the run, and targets written before it stay on disk.
pub fn run(args: CliArgs) -> Result<()> {
    use crate::config::GeneratorConfig;
    use crate::openapi_builder::generate_spec;
    use crate::parser::ManifestParser;
    use crate::scanner::FileScanner;
    use crate::serializer::{write_to_file, writer_for};

    let config = GeneratorConfig::load_or_default(args.config_path.as_deref())
        .context("Failed to load configuration")?;

    // Step 1: Scan directory for manifests
    info!("Scanning project directory...");
    let scanner = FileScanner::new(args.project_path.clone());
    let scan_result = scanner.scan()?;
    info!("Found {} manifest files", scan_result.manifest_files.len());

    if scan_result.manifest_files.is_empty() {
        anyhow::bail!("No manifest files found in the project directory");
    }

    // Step 2: Load and merge manifests
    let project = ManifestParser::load_project(&scan_result.manifest_files)?;
    if project.routes.is_empty() {
        log::warn!("No routes found in the project");
    }

    // Step 3: One spec per configured output target
    let output_dir = args.output_dir.clone().unwrap_or_else(|| args.project_path.clone());
    for group in &config.route_prefixes {
        info!("Generating {} ({:?} {})", group.output, group.match_kind, group.value);

        let spec = generate_spec(&project, &project.routes, group, &config)
            .with_context(|| format!("Failed to generate {}", group.output))?;
        let content = writer_for(group.writer, &group.options)
            .output(&spec)
            .with_context(|| format!("Failed to render {}", group.output))?;

        let output_path = output_dir.join(&group.output);
        write_to_file(&content, &output_path)?;
        info!("Output generated at {}", output_path.display());
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Manifests: {}", scan_result.manifest_files.len());
    info!("  - Routes: {}", project.routes.len());
    info!("  - Outputs: {}", config.route_prefixes.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(project_path: PathBuf) -> CliArgs {
        CliArgs {
            project_path,
            config_path: None,
            output_dir: None,
            verbose: false,
        }
    }

    #[test]
    fn test_parse_cli_flags() {
        let args = CliArgs::parse_from(["route-schema-gen", "./project", "-c", "gen.yaml", "-o", "out", "-v"]);
        assert_eq!(args.project_path, PathBuf::from("./project"));
        assert_eq!(args.config_path, Some(PathBuf::from("gen.yaml")));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert!(args.verbose);
    }

    #[test]
    fn test_rejects_missing_project() {
        let result = parse_args_from_parsed(args(PathBuf::from("/nonexistent/project")));
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_file_as_project() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("routes.json");
        fs::write(&file, "{}").unwrap();

        let result = parse_args_from_parsed(args(file));
        assert!(result.is_err());
    }

    #[test]
    fn test_run_without_manifests_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = run(args(temp_dir.path().to_path_buf()));
        assert!(result.is_err());
    }
}
