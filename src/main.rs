//! Quarry - ask business questions of your SQL database.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quarry::pipeline::SchemaIntrospector;
use quarry::{repl, App, Config};

/// Ask business questions in plain language
#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default locations
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (default)
    Repl,

    /// Answer a single question and exit
    Ask {
        /// The question to answer
        question: String,

        /// Print the full session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the database schema as the model sees it
    Schema,

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over the flag
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to read .env");
        }
    }

    let config_path = cli.config.as_deref();

    match cli.command {
        None | Some(Commands::Repl) => cmd_repl(config_path)?,
        Some(Commands::Ask { question, json }) => cmd_ask(config_path, &question, json)?,
        Some(Commands::Schema) => cmd_schema(config_path)?,
        Some(Commands::Config { path }) => cmd_config(config_path, path)?,
        Some(Commands::Completions { shell }) => cmd_completions(shell),
    }

    Ok(())
}

/// Run the interactive loop.
fn cmd_repl(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_with(config_path)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let app = App::from_config(config).await?;
        let stdin = io::stdin();
        repl::run_repl(&app, stdin.lock(), io::stdout()).await
    })
}

/// Answer one question.
fn cmd_ask(config_path: Option<&Path>, question: &str, json: bool) -> Result<()> {
    let config = Config::load_with(config_path)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let app = App::from_config(config).await?;
        let session = app.ask(question).await?;

        let mut stdout = io::stdout();
        if json {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&session)?)?;
        } else {
            repl::print_session(&session, &app.config.repl, &mut stdout)?;
        }
        Ok(())
    })
}

/// Print the introspected schema.
fn cmd_schema(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_with(config_path)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let store = quarry::store::connect(&config.database).await?;
        println!("{}", SchemaIntrospector::new(store).fetch().await);
        Ok(())
    })
}

/// Show configuration.
fn cmd_config(config_path: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(Config::discover)
            .or_else(|| Config::config_dir().map(|dir| dir.join("config.toml")));
        if let Some(path) = path {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load_with(config_path)?;
    let toml = toml::to_string_pretty(&config.redacted())?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "quarry", &mut io::stdout());
}
