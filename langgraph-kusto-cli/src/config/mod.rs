//! Configuration for the CLI.
//!
//! Re-exports [`CliConfig`], [`EmbeddingSource`] and config [`Error`].

mod cli_config;

pub use cli_config::{load_dotenv, CliConfig, EmbeddingSource, Error};
