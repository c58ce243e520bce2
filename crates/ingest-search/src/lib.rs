//! `SearchWriter` port implementations (spec §4.H).

pub mod http;
pub mod memory;

pub use http::HttpSearchWriter;
pub use memory::InMemorySearchWriter;
