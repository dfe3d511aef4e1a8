//! Split Settings CLI
//!
//! Entry point for the `split-settings` command-line tool.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use split_settings::fragment::{compile_file, compiled_path_for, FragmentKind};
use split_settings::resolve::absolute;
use split_settings::{MemoryRegistry, NoopRegistry, ToolConfig};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "split-settings")]
#[command(about = "Compose a settings namespace from many files", version)]
struct Cli {
    /// Tool config file (default: ./split-settings.toml when present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Extra package search root (repeatable)
    #[arg(long = "search-path", global = true)]
    search_paths: Vec<PathBuf>,

    /// Package directory as NAME=DIR (repeatable)
    #[arg(long = "package", value_parser = parse_package, global = true)]
    packages: Vec<(String, PathBuf)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge a settings file and print the resulting values
    Merge {
        /// Root settings file
        file: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Include inclusion bookkeeping in the output
        #[arg(long)]
        bookkeeping: bool,
    },

    /// List the files a settings file merges, in merge order
    Files {
        /// Root settings file
        file: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compile a source fragment
    Compile {
        /// Source fragment
        source: PathBuf,

        /// Output path (default: next to the source with the compiled extension)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show the effective tool configuration and where it came from
    Config,
}

fn parse_package(s: &str) -> std::result::Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, dir)) if !name.is_empty() && !dir.is_empty() => {
            Ok((name.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected NAME=DIR, got '{s}'")),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Merge {
            file,
            json,
            bookkeeping,
        } => run_merge(&config, &file, json, bookkeeping || config.show_bookkeeping),
        Commands::Files { file, json } => run_files(&config, &file, json),
        Commands::Compile { source, output } => run_compile(&source, output),
        Commands::Config => run_config(&config),
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ToolConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => {
            let cwd = std::env::current_dir().context("Failed to read working directory")?;
            ToolConfig::discover(&cwd)
        }
    };

    let mut overrides = Map::new();
    if !cli.search_paths.is_empty() {
        overrides.insert("search_paths".to_string(), json!(cli.search_paths));
    }
    if !cli.packages.is_empty() {
        let packages: Map<String, Value> = cli
            .packages
            .iter()
            .map(|(name, dir)| (name.clone(), json!(dir)))
            .collect();
        overrides.insert("packages".to_string(), Value::Object(packages));
    }
    let overrides = (!overrides.is_empty()).then_some(Value::Object(overrides));

    ToolConfig::build(path.as_deref(), overrides).context("Failed to load tool configuration")
}

/// Directory of the root settings file; registry names are relative to it
fn root_dir(file: &Path) -> Result<PathBuf> {
    let file = absolute(file).with_context(|| format!("Failed to resolve {}", file.display()))?;
    Ok(file.parent().map(Path::to_path_buf).unwrap_or_default())
}

fn run_merge(config: &ToolConfig, file: &Path, json_output: bool, bookkeeping: bool) -> Result<()> {
    let engine = config.engine(Arc::new(NoopRegistry), &root_dir(file)?);

    let scope = engine
        .merge_file(file)
        .with_context(|| format!("Failed to merge {}", file.display()))?;
    info!(files = scope.included_files().len(), names = scope.len(), "merge complete");

    let output = if bookkeeping {
        scope.to_value()
    } else {
        Value::Object(scope.into_values())
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Value::Object(map) = output {
        for (name, value) in map {
            println!("{name} = {value}");
        }
    }
    Ok(())
}

fn run_files(config: &ToolConfig, file: &Path, json_output: bool) -> Result<()> {
    let registry = Arc::new(MemoryRegistry::new());
    let engine = config.engine(registry.clone(), &root_dir(file)?);

    let scope = engine
        .merge_file(file)
        .with_context(|| format!("Failed to merge {}", file.display()))?;

    let mut entries = Vec::new();
    for path in scope.included_files() {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let digest = hex::encode(Sha256::digest(&bytes));
        entries.push(json!({
            "path": path,
            "kind": FragmentKind::of_path(path),
            "module": registry.name_of(path),
            "sha256": digest,
        }));
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!(
                "{}  {}  {}",
                entry["sha256"].as_str().unwrap_or_default(),
                entry["module"].as_str().unwrap_or("-"),
                entry["path"].as_str().unwrap_or_default(),
            );
        }
    }
    Ok(())
}

fn run_compile(source: &Path, output: Option<PathBuf>) -> Result<()> {
    if FragmentKind::of_path(source) == FragmentKind::Compiled {
        bail!("{} is already compiled", source.display());
    }
    let dest = output.unwrap_or_else(|| compiled_path_for(source));

    compile_file(source, &dest)
        .with_context(|| format!("Failed to compile {}", source.display()))?;
    info!(source = %source.display(), dest = %dest.display(), "compiled fragment");
    println!("{}", dest.display());
    Ok(())
}

fn run_config(config: &ToolConfig) -> Result<()> {
    println!("{}", config.to_json()?);
    Ok(())
}
