//! Retrieval-augmented response pipeline

pub mod context;
pub mod pipeline;
pub mod retriever;

pub use context::ContextAssembler;
pub use pipeline::ChatEngine;
pub use retriever::RetrievalEngine;
