pub mod filter;
pub mod payload;
pub mod qdrant;

mod error;

pub use error::Error;
pub use filter::build_metadata_filter;
pub use qdrant::{QdrantStore, VectorSearch};

pub type Result<T, E = Error> = std::result::Result<T, E>;
