use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

#[derive(Parser)]
#[command(name = "repo-agent")]
#[command(
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), env!("REPO_AGENT_VERSION_SUFFIX")),
    about = "LLM agent that edits a checked-out repository through sandboxed tools",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent against a repository until it finishes or hits the round cap
    #[command(group(
        ArgGroup::new("task")
            .required(true)
            .args(["prompt", "ticket", "review"])
    ))]
    Run {
        /// Repository root the agent may touch
        #[arg(long)]
        repo: PathBuf,

        /// Free-form task prompt sent as the first message
        #[arg(long)]
        prompt: Option<String>,

        /// Ticket JSON file (key, summary, description, acceptance_criteria, ...)
        #[arg(long)]
        ticket: Option<PathBuf>,

        /// Review comment JSON file (one object or an array)
        #[arg(long)]
        review: Option<PathBuf>,

        /// File whose content replaces the default system prompt
        #[arg(long)]
        system_prompt: Option<PathBuf>,

        /// LLM provider to use (bedrock, claude)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum model round-trips
        #[arg(long)]
        max_rounds: Option<usize>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the tool schema catalogue as JSON
    Tools,

    /// Execute a single tool call inside the repository sandbox
    Exec {
        /// Repository root the tool may touch
        #[arg(long)]
        repo: PathBuf,

        /// Tool name, e.g. read_file
        tool: String,

        /// Tool input as a JSON object
        #[arg(default_value = "{}")]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "repo_agent=debug"
    } else {
        "repo_agent=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            repo,
            prompt,
            ticket,
            review,
            system_prompt,
            provider,
            model,
            max_rounds,
            json,
        } => {
            let task = cli::TaskSource::from_args(prompt, ticket, review)?;
            let options = cli::RunOptions {
                repo,
                task,
                system_prompt,
                provider,
                model,
                max_rounds,
                json,
            };
            if let Err(e) = cli::run_agent(&config, options).await {
                tracing::error!("Agent run failed: {:#}", e);
                return Err(e);
            }
        }
        Commands::Tools => {
            cli::print_tools(&config)?;
        }
        Commands::Exec { repo, tool, input } => {
            let ok = cli::exec_tool(&config, &repo, &tool, &input).await?;
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
