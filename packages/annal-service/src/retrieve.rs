use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use uuid::Uuid;

use annal_domain::{ChunkMetadata, Evaluation, ScoredChunk, SearchMetadata, SearchResult};

use crate::{
	AnnalService, Error, NoProgress, Result, RetrievalRequest, SearchProgress,
	request::{self, Plan},
	strategy::Strategy,
};

/// A chunk as clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkView {
	pub id: String,
	pub content: String,
	pub metadata: ChunkMetadata,
	/// Vector similarity score.
	pub relevance_score: f32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub vector_similarity_score: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub llm_evaluation_score: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub llm_evaluation_text: Option<String>,
	/// Present on the judge-assisted path only.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub judged: Option<bool>,
}
impl From<ScoredChunk> for ChunkView {
	fn from(scored: ScoredChunk) -> Self {
		let ScoredChunk { chunk, vector_score, evaluation } = scored;
		let mut view = Self {
			id: chunk.id,
			content: chunk.text,
			metadata: chunk.metadata,
			relevance_score: vector_score,
			vector_similarity_score: None,
			llm_evaluation_score: None,
			llm_evaluation_text: None,
			judged: None,
		};

		match evaluation {
			Evaluation::NotRequested => {},
			Evaluation::Judged { score, justification } => {
				view.vector_similarity_score = Some(vector_score);
				view.llm_evaluation_score = Some(score);
				view.llm_evaluation_text = Some(justification);
				view.judged = Some(true);
			},
			Evaluation::Unjudged { reason } => {
				view.vector_similarity_score = Some(vector_score);
				view.llm_evaluation_text = Some(reason);
				view.judged = Some(false);
			},
		}

		view
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetadata {
	#[serde(flatten)]
	pub search: SearchMetadata,
	pub total_time_ms: u64,
	pub total_chunks_found: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResponse {
	pub request_id: Uuid,
	pub chunks: Vec<ChunkView>,
	pub metadata: RetrievalMetadata,
}

impl AnnalService {
	pub async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResponse> {
		self.retrieve_with_progress(request, &NoProgress).await
	}

	/// Validates the request, runs the selected strategy under the request timeout and renders
	/// the result. Strategy errors are returned unchanged.
	pub async fn retrieve_with_progress(
		&self,
		request: RetrievalRequest,
		progress: &dyn SearchProgress,
	) -> Result<RetrievalResponse> {
		let started = Instant::now();
		let request_id = Uuid::new_v4();
		let Plan { mut config, strategy, expansion_top_n } = request::plan(&self.cfg, &request)?;

		if let Some(top_n) = expansion_top_n {
			config = self.broaden_keywords(config, top_n).await?;
		}

		tracing::info!(
			request_id = %request_id,
			strategy = strategy.kind().as_str(),
			year_range = %config.year_range,
			chunk_size = config.chunk_size,
			"Retrieval started."
		);

		let result = self.run_strategy(&strategy, &config, progress).await.inspect_err(|err| {
			tracing::warn!(request_id = %request_id, error = %err, "Retrieval failed.");
		})?;
		let total_time_ms = started.elapsed().as_millis() as u64;

		tracing::info!(
			request_id = %request_id,
			chunks = result.chunks.len(),
			total_time_ms,
			"Retrieval finished."
		);

		Ok(present(request_id, result, total_time_ms))
	}

	pub async fn run_strategy(
		&self,
		strategy: &Strategy,
		config: &annal_domain::SearchConfig,
		progress: &dyn SearchProgress,
	) -> Result<SearchResult> {
		let judge_model = match strategy {
			Strategy::Agent(agent) => self.cfg.model(&agent.model).cloned(),
			_ => None,
		};
		let ctx = self.strategy_context(judge_model);
		let limit = Duration::from_millis(self.cfg.search.request_timeout_ms);

		match timeout(limit, strategy.run(&ctx, config, progress)).await {
			Ok(result) => result,
			Err(_) => Err(Error::Cancelled {
				message: format!("Request exceeded {} ms.", self.cfg.search.request_timeout_ms),
			}),
		}
	}
}

fn present(request_id: Uuid, result: SearchResult, total_time_ms: u64) -> RetrievalResponse {
	let SearchResult { chunks, metadata } = result;
	let chunks = chunks.into_iter().map(ChunkView::from).collect::<Vec<_>>();

	RetrievalResponse {
		request_id,
		metadata: RetrievalMetadata {
			search: metadata,
			total_time_ms,
			total_chunks_found: chunks.len(),
		},
		chunks,
	}
}
