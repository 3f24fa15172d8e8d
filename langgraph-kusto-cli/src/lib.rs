//! langgraph-kusto-cli library: provisioning and smoke-test routines behind the
//! `langgraph-kusto` binary.
//!
//! Reads cluster, table and embedding settings from env / .env, then either provisions the
//! tables and live views, drops them, or runs a live put → get → search → delete pass plus a
//! checkpoint round trip against the configured database.
//!
//! ## Usage
//!
//! ```rust,no_run,ignore
//! let config = langgraph_kusto_cli::CliConfig::from_env()?;
//! let client = langgraph_kusto::ClientRegistry::new().connect(config.kusto.clone())?;
//! let report = langgraph_kusto_cli::sanity(client, &config)?;
//! ```

mod config;
mod run;

pub use config::{load_dotenv, CliConfig, EmbeddingSource, Error};
pub use run::{print_schema_report, purge, sanity, setup, SanityReport};

#[cfg(test)]
mod tests;
