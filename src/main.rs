//! Route Schema Generator - command-line tool producing OpenAPI documents and
//! TypeScript declarations from exported route and class metadata.
//!
//! # Usage
//!
//! ```bash
//! route-schema-gen [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate with the default configuration (one `openapi.json` for `api` routes):
//! ```bash
//! route-schema-gen ./manifests
//! ```
//!
//! Generate every target of a configuration into `public/docs`:
//! ```bash
//! route-schema-gen ./manifests -c route-schema-gen.yaml -o public/docs
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! route-schema-gen ./manifests -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use route_schema_gen::cli;

fn main() -> Result<()> {
    // Parse once to read the verbose flag before the logger exists
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Route schema generator starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;
    cli::run(args)?;

    info!("Generation completed successfully");

    Ok(())
}
