pub mod chunk;
pub mod date_serde;
pub mod keywords;
pub mod search;
pub mod years;

mod error;

pub use chunk::{Chunk, ChunkMetadata, Evaluation, ScoredChunk};
pub use error::{Error, Result};
pub use keywords::{KeywordExpr, extract_terms};
pub use search::{
	AgentSearchConfig, JudgeOutcome, SearchConfig, SearchMetadata, SearchResult, StrategyKind,
	WindowReport,
};
pub use years::{YearRange, YearWindow};
