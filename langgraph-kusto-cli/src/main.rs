//! `langgraph-kusto` binary: provision, purge or smoke-test the Kusto memory store and
//! checkpoint saver configured in env / .env.

use clap::{Parser, Subcommand};
use langgraph_kusto::ClientRegistry;
use langgraph_kusto_cli::{load_dotenv, print_schema_report, purge, sanity, setup, CliConfig, Error};

#[derive(Parser, Debug)]
#[command(name = "langgraph-kusto")]
#[command(about = "Kusto-backed LangGraph memory store and checkpoint saver")]
struct Args {
    /// Log every generated query and command (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the raw tables and live views (idempotent)
    Setup,
    /// Drop the live views and raw tables, history included
    Purge {
        /// Required: purging deletes all stored memories and checkpoints
        #[arg(long)]
        yes: bool,
    },
    /// Put / get / search / delete a probe record and round-trip one checkpoint
    Sanity,
}

fn init_tracing(verbose: bool) -> Result<(), Error> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let default = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new(default)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(filter);
    tracing_subscriber::registry().with(stderr_layer).try_init()?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    load_dotenv();
    if let Err(e) = init_tracing(args.verbose) {
        eprintln!("warning: tracing not initialized: {}", e);
    }
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Error> {
    let config = CliConfig::from_env()?;
    let client = ClientRegistry::new().connect(config.kusto.clone())?;
    tracing::info!(cluster = %config.kusto.cluster_uri, database = %config.kusto.database, "Connected");

    match args.command {
        Command::Setup => {
            let report = setup(client.as_ref(), &config.tables);
            print_schema_report("setup", &report);
            if !report.is_complete() {
                eprintln!("some steps failed; objects may already exist or the principal lacks admin rights");
            }
        }
        Command::Purge { yes } => {
            if !yes {
                return Err("purge drops all stored data; re-run with --yes".into());
            }
            let report = purge(client.as_ref(), &config.tables);
            print_schema_report("purge", &report);
            if !report.is_complete() {
                return Err(format!("{} purge steps failed", report.failed.len()).into());
            }
        }
        Command::Sanity => {
            let report = sanity(client, &config)?;
            println!(
                "sanity {}: {} steps passed (vector search {})",
                report.run_id,
                report.passed.len(),
                if report.vector_search { "on" } else { "off" }
            );
            for step in &report.passed {
                println!("  ok    {}", step);
            }
        }
    }
    Ok(())
}
