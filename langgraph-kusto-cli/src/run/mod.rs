//! Subcommand bodies. The binary parses flags and connects; everything else lives here so
//! it can run against a scripted client in tests.

mod sanity;
mod schema;

pub use sanity::{sanity, SanityReport};
pub use schema::{print_schema_report, purge, setup};
