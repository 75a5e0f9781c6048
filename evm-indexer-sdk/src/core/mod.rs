//! Indexing pipeline: source, decoder, registry, reader, engine and queries.

pub mod decoder;
pub mod indexer;
pub mod query;
pub mod reader;
pub mod registry;
pub mod registry_metrics;
pub mod source;
