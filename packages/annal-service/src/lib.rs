pub mod analysis;
pub mod gateway;
pub mod judge;
pub mod keywords;
pub mod progress;
pub mod public_config;
pub mod request;
pub mod retrieve;
pub mod strategy;

mod error;

pub use analysis::{AnalysisChunk, AnalysisMetadata, AnalysisRequest, AnalysisResponse};
pub use error::{Error, Result};
pub use gateway::{QdrantGateway, SimilarityQuery};
pub use keywords::{ExpandRequest, KeywordExpansion};
pub use progress::{NoProgress, SearchProgress};
pub use public_config::{ModelInfo, PublicConfig};
pub use request::{AgentOptions, RetrievalRequest};
pub use retrieve::{ChunkView, RetrievalMetadata, RetrievalResponse};
pub use strategy::{Strategy, StrategyContext};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio::sync::Semaphore;

use annal_config::{Config, EmbeddingProviderConfig, LexiconProviderConfig, LlmProviderConfig};
use annal_domain::ScoredChunk;
use annal_providers::{
	embedding,
	generation::{self, Generation, GenerationRequest},
	lexicon::{self, SimilarWord},
};
use annal_storage::QdrantStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, annal_providers::Result<Vec<Vec<f32>>>>;
}

/// One capability shared by answer synthesis and relevance judging.
pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a GenerationRequest,
	) -> BoxFuture<'a, annal_providers::Result<Generation>>;
}

pub trait LexiconProvider
where
	Self: Send + Sync,
{
	fn find_similar_words<'a>(
		&'a self,
		cfg: &'a LexiconProviderConfig,
		term: &'a str,
		top_n: u32,
	) -> BoxFuture<'a, annal_providers::Result<Vec<SimilarWord>>>;
}

/// Similarity search over indexed passages, highest similarity first.
pub trait VectorStore
where
	Self: Send + Sync,
{
	fn similarity_search<'a>(
		&'a self,
		query: &'a SimilarityQuery,
	) -> BoxFuture<'a, Result<Vec<ScoredChunk>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
	pub lexicon: Arc<dyn LexiconProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		generation: Arc<dyn GenerationProvider>,
		lexicon: Arc<dyn LexiconProvider>,
	) -> Self {
		Self { embedding, generation, lexicon }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), generation: provider.clone(), lexicon: provider }
	}
}

pub struct AnnalService {
	pub cfg: Config,
	pub store: Arc<dyn VectorStore>,
	pub providers: Providers,
	judge_gate: Arc<Semaphore>,
}
impl AnnalService {
	pub fn new(cfg: Config, qdrant: QdrantStore) -> Self {
		let providers = Providers::default();
		let store = Arc::new(QdrantGateway::new(
			qdrant,
			cfg.providers.embedding.clone(),
			providers.embedding.clone(),
		));

		Self::with_collaborators(cfg, store, providers)
	}

	pub fn with_collaborators(
		cfg: Config,
		store: Arc<dyn VectorStore>,
		providers: Providers,
	) -> Self {
		let judge_gate = Arc::new(Semaphore::new(cfg.agent.judge_concurrency.max(1) as usize));

		Self { cfg, store, providers, judge_gate }
	}

	/// Collaborators and limits handed to a strategy run.
	pub fn strategy_context(&self, judge_model: Option<LlmProviderConfig>) -> StrategyContext {
		StrategyContext {
			store: self.store.clone(),
			generation: self.providers.generation.clone(),
			judge_model,
			judge_gate: self.judge_gate.clone(),
			gateway_timeout: Duration::from_millis(self.cfg.search.gateway_timeout_ms),
			judge_timeout: Duration::from_millis(self.cfg.agent.judge_timeout_ms),
			window_concurrency: self.cfg.search.window_concurrency.max(1) as usize,
			max_chunk_chars: self.cfg.agent.max_chunk_chars as usize,
		}
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, annal_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a GenerationRequest,
	) -> BoxFuture<'a, annal_providers::Result<Generation>> {
		Box::pin(generation::generate(cfg, request))
	}
}

impl LexiconProvider for DefaultProviders {
	fn find_similar_words<'a>(
		&'a self,
		cfg: &'a LexiconProviderConfig,
		term: &'a str,
		top_n: u32,
	) -> BoxFuture<'a, annal_providers::Result<Vec<SimilarWord>>> {
		Box::pin(lexicon::find_similar_words(cfg, term, top_n))
	}
}
