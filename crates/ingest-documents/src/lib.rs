//! Event-to-document factory and document chunking model (spec §4.D, §4.G).

pub mod chunking;
pub mod factory;

pub use chunking::{chunk_document, ChunkingResult, ChunkingRule, ChunkingStrategyKind, DocumentChunk};
pub use factory::{build_document, is_newer};
