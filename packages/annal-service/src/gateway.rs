use std::sync::Arc;

use annal_config::EmbeddingProviderConfig;
use annal_domain::{KeywordExpr, ScoredChunk, YearRange};
use annal_storage::{QdrantStore, VectorSearch};

use crate::{BoxFuture, EmbeddingProvider, Error, Result, VectorStore};

/// Parameters of one vector store call.
#[derive(Debug, Clone)]
pub struct SimilarityQuery {
	pub query: String,
	pub chunk_size: u32,
	pub limit: u32,
	pub year_range: Option<YearRange>,
	pub min_score: Option<f32>,
	pub keywords: Option<KeywordExpr>,
	pub search_fields: Vec<String>,
	/// Enforced keywords filter the index. Otherwise matching terms are only recorded on each
	/// chunk.
	pub enforce_keywords: bool,
}

/// [`VectorStore`] over Qdrant, embedding the query text first.
pub struct QdrantGateway {
	store: QdrantStore,
	embedding_cfg: EmbeddingProviderConfig,
	embedding: Arc<dyn EmbeddingProvider>,
}
impl QdrantGateway {
	pub fn new(
		store: QdrantStore,
		embedding_cfg: EmbeddingProviderConfig,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self { store, embedding_cfg, embedding }
	}

	async fn search(&self, query: &SimilarityQuery) -> Result<Vec<ScoredChunk>> {
		let texts = [query.query.clone()];
		let vector = self
			.embedding
			.embed(&self.embedding_cfg, &texts)
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| Error::Provider {
				message: "Embedding provider returned no vector for the query.".to_string(),
			})?;
		let enforced = query.keywords.as_ref().filter(|_| query.enforce_keywords);
		let filter = annal_storage::build_metadata_filter(
			query.year_range.as_ref(),
			enforced,
			&query.search_fields,
			&self.store.payload,
		);
		let mut chunks = self
			.store
			.search(VectorSearch {
				chunk_size: query.chunk_size,
				vector,
				limit: u64::from(query.limit),
				filter,
				score_threshold: query.min_score,
			})
			.await?;

		if !query.enforce_keywords {
			annotate_keyword_hits(&mut chunks, query.keywords.as_ref());
		}

		Ok(chunks)
	}
}
impl VectorStore for QdrantGateway {
	fn similarity_search<'a>(
		&'a self,
		query: &'a SimilarityQuery,
	) -> BoxFuture<'a, Result<Vec<ScoredChunk>>> {
		Box::pin(self.search(query))
	}
}

/// Records matched positive terms on each chunk without touching the order.
pub fn annotate_keyword_hits(chunks: &mut [ScoredChunk], keywords: Option<&KeywordExpr>) {
	let Some(expr) = keywords else {
		return;
	};

	for scored in chunks {
		scored.chunk.metadata.keyword_hits = expr.hits(&scored.chunk.text);
	}
}
