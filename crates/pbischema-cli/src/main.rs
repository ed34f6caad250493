use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pbischema_core::Config;
use pbischema_engine::{ContextProjector, MarkdownProjector, SchemaNormalizer, SchemaSource};

const DEFAULT_CONFIG_FILE: &str = "pbischema.toml";

/// pbischema - Power BI model schema extraction
#[derive(Parser)]
#[command(name = "pbischema")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: pbischema.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot directory (overrides config and PBISCHEMA_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a schema and store it as a new snapshot
    Extract {
        #[command(subcommand)]
        source: ExtractSource,
    },

    /// List stored snapshots, newest first
    List,

    /// Print a stored snapshot as JSON
    Show {
        /// Snapshot id
        id: String,
    },

    /// Render a stored snapshot as prompt context
    Context {
        /// Snapshot id
        id: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a config file with default settings
    Init {
        /// Destination (default: pbischema.toml)
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ExtractSource {
    /// Extract from a TMDL project directory
    Tmdl {
        /// Project directory
        dir: PathBuf,

        /// Print the full parsed project instead of creating a snapshot
        #[arg(long)]
        raw: bool,

        /// Write JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract from a PBIX file
    Pbix {
        /// PBIX file
        file: PathBuf,

        /// Write JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Init { path, force } => init_command(path, *force),
        Commands::Extract { source } => extract_command(&open_normalizer(&cli)?, source),
        Commands::List => list_command(&open_normalizer(&cli)?),
        Commands::Show { id } => show_command(&open_normalizer(&cli)?, id),
        Commands::Context { id, output } => {
            context_command(&open_normalizer(&cli)?, id, output.as_deref())
        }
    }
}

fn open_normalizer(cli: &Cli) -> Result<SchemaNormalizer> {
    let config = load_config(cli)?;
    if cli.verbose {
        eprintln!("{} {}", "Snapshot directory:".cyan(), config.data_dir.display());
    }

    SchemaNormalizer::from_config(&config)
        .with_context(|| format!("Cannot open snapshot store {}", config.data_dir.display()))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Config file, then PBISCHEMA_DATA_DIR, then --data-dir
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(path) = &cli.config {
        Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG_FILE))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    config.apply_env();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }

    Ok(config)
}

fn extract_command(normalizer: &SchemaNormalizer, source: &ExtractSource) -> Result<()> {
    let (source, output) = match source {
        ExtractSource::Tmdl {
            dir,
            raw: true,
            output,
        } => {
            let project = normalizer
                .raw_tmdl(dir)
                .with_context(|| format!("Failed to parse TMDL project {}", dir.display()))?;
            return write_output(&project.to_json()?, output.as_deref());
        }
        ExtractSource::Tmdl { dir, output, .. } => {
            (SchemaSource::TmdlDirectory(dir.clone()), output)
        }
        ExtractSource::Pbix { file, output } => (SchemaSource::PbixFile(file.clone()), output),
    };

    let kind = source.kind();
    let snapshot = normalizer
        .extract(source)
        .with_context(|| format!("Failed to extract {} schema", kind))?;

    eprintln!(
        "{} {} ({} tables, {} measures, {} relationships, {} visualizations)",
        "Snapshot created:".green(),
        snapshot.id.bold(),
        snapshot.schema.tables.len(),
        snapshot.schema.measures.len(),
        snapshot.schema.relationships.len(),
        snapshot.schema.visualizations.len(),
    );

    write_output(&snapshot.schema.to_json()?, output.as_deref())
}

fn list_command(normalizer: &SchemaNormalizer) -> Result<()> {
    let snapshots = normalizer.list()?;

    if snapshots.is_empty() {
        eprintln!("{}", "No snapshots found".yellow());
        return Ok(());
    }

    for info in snapshots {
        println!(
            "{:<28} {:<20} {}",
            info.id.bold(),
            info.created_at,
            info.source_kind.to_string().cyan()
        );
    }

    Ok(())
}

fn show_command(normalizer: &SchemaNormalizer, id: &str) -> Result<()> {
    let schema = normalizer
        .load(id)
        .ok_or_else(|| anyhow::anyhow!("Snapshot not found: {}", id))?;
    println!("{}", schema.to_json()?);
    Ok(())
}

fn context_command(normalizer: &SchemaNormalizer, id: &str, output: Option<&Path>) -> Result<()> {
    let schema = normalizer
        .load(id)
        .ok_or_else(|| anyhow::anyhow!("Snapshot not found: {}", id))?;
    write_output(&MarkdownProjector.project(&schema), output)
}

fn init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default().save_to_file(path)?;
    eprintln!("{} {}", "Config written to:".green(), path.display());
    Ok(())
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} {}", "Output written to:".green(), path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_extract_subcommands() {
        let cli = Cli::parse_from(["pbischema", "extract", "tmdl", "model", "--raw"]);
        assert!(matches!(
            cli.command,
            Commands::Extract {
                source: ExtractSource::Tmdl { raw: true, .. }
            }
        ));

        let cli = Cli::parse_from([
            "pbischema",
            "--data-dir",
            "/tmp/schemas",
            "extract",
            "pbix",
            "report.pbix",
            "-o",
            "out.json",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/schemas")));
        assert!(matches!(
            cli.command,
            Commands::Extract {
                source: ExtractSource::Pbix { output: Some(_), .. }
            }
        ));
    }

    #[test]
    fn data_dir_flag_overrides_config() {
        let cli = Cli::parse_from(["pbischema", "--data-dir", "elsewhere", "list"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("elsewhere"));
    }

    #[test]
    fn init_writes_config_without_opening_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pbischema.toml");
        let cli = Cli::parse_from(["pbischema", "init", path.to_str().unwrap()]);

        let Commands::Init { path, force } = &cli.command else {
            panic!("expected init command");
        };
        init_command(path, *force).unwrap();

        assert_eq!(Config::from_file(path).unwrap().pbix, Config::default().pbix);
        assert!(init_command(path, false).is_err());
        assert!(init_command(path, true).is_ok());
    }
}
