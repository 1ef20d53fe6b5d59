use clap::{Parser, Subcommand};
use nash::commands::{context, git, index, session};
use nash::config::AppConfig;
use nash::telemetry::init_logging;

#[derive(Parser, Debug)]
#[command(version, about = "Context assembly for a shell assistant", long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults: ~/.config/nash/nash.toml, ./nash.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk a directory and report what was indexed
    Index {
        path: Option<String>,
        #[arg(long)]
        max_files: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Index, then print the assembled context for a query
    Context {
        query: String,
        #[arg(long)]
        path: Option<String>,
        /// Print the role-tagged message list instead of the context string
        #[arg(long)]
        json: bool,
    },
    /// Print Git status and staged diff
    Git {
        #[arg(long)]
        path: Option<String>,
    },
    /// Watch a directory and answer queries read from stdin
    Session { path: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::from_path(args.config)?;
    let _guard = init_logging(&config)?;

    match args.cmd {
        Commands::Index {
            path,
            max_files,
            json,
        } => {
            index::index_directory(
                index::IndexOptions {
                    path,
                    max_files,
                    json,
                },
                &config,
            )
            .await?
        }
        Commands::Context { query, path, json } => {
            context::print_context(context::ContextOptions { query, path, json }, &config).await?
        }
        Commands::Git { path } => git::print_git_context(path, &config)?,
        Commands::Session { path } => session::run_session(path, &config).await?,
    }

    Ok(())
}
