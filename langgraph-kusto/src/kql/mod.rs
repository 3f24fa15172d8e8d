//! # KQL generation
//!
//! [`literal`] turns typed values into literal text; [`builder`] composes those literals into
//! the queries and `.set-or-append` commands used by the memory layer and the checkpoint saver.
//! Nothing here performs I/O.

pub mod builder;
pub mod literal;

pub use builder::{namespace_condition, IngestRow, KqlBuilder, NamespaceMatch, NAMESPACE_SEPARATOR};
pub use literal::{
    encode, encode_datetime, encode_dynamic, encode_string, encode_vector, vector_value, KqlValue,
};
