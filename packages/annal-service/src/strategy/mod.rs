//! The closed set of retrieval strategies.

mod agent;
mod standard;
mod time_window;

use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use tokio::{sync::Semaphore, task::JoinSet, time::timeout};

use annal_config::LlmProviderConfig;
use annal_domain::{
	AgentSearchConfig, ScoredChunk, SearchConfig, SearchResult, StrategyKind, WindowReport,
	YearWindow,
};

use crate::{Error, GenerationProvider, Result, SearchProgress, SimilarityQuery, VectorStore};

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
	/// One vector search over the whole year range.
	Standard,
	/// One vector search per window of `width` years.
	TimeWindow { width: u32, chunks_per_window: u32 },
	/// Per-window recall followed by relevance judging.
	Agent(AgentSearchConfig),
}
impl Strategy {
	pub fn kind(&self) -> StrategyKind {
		match self {
			Self::Standard => StrategyKind::Standard,
			Self::TimeWindow { .. } => StrategyKind::TimeWindow,
			Self::Agent(_) => StrategyKind::TimeWindowAgent,
		}
	}

	pub async fn run(
		&self,
		ctx: &StrategyContext,
		config: &SearchConfig,
		progress: &dyn SearchProgress,
	) -> Result<SearchResult> {
		config.validate()?;

		match self {
			Self::Standard => standard::run(ctx, config, progress).await,
			Self::TimeWindow { width, chunks_per_window } =>
				time_window::run(ctx, config, *width, *chunks_per_window, progress).await,
			Self::Agent(agent) => agent::run(ctx, config, agent, progress).await,
		}
	}
}

/// Shared collaborators and limits of a strategy run. Cheap to clone into window tasks.
#[derive(Clone)]
pub struct StrategyContext {
	pub store: Arc<dyn VectorStore>,
	pub generation: Arc<dyn GenerationProvider>,
	/// Registry entry of the judge model, required by the agent strategy.
	pub judge_model: Option<LlmProviderConfig>,
	/// Process-wide limit on concurrent judge calls.
	pub judge_gate: Arc<Semaphore>,
	pub gateway_timeout: Duration,
	pub judge_timeout: Duration,
	pub window_concurrency: usize,
	pub max_chunk_chars: usize,
}

/// Result of one window task.
struct WindowOutcome {
	chunks: Vec<ScoredChunk>,
	report: WindowReport,
}

/// Chunks recalled for one window, restricted to the window's years.
struct Recall {
	chunks: Vec<ScoredChunk>,
	timed_out: bool,
}

fn window_query(
	config: &SearchConfig,
	window: &YearWindow,
	limit: u32,
	min_score: f32,
) -> Result<SimilarityQuery> {
	Ok(SimilarityQuery {
		query: config.query.clone(),
		chunk_size: config.chunk_size,
		limit,
		year_range: Some(window.range),
		min_score: Some(min_score),
		keywords: config.keyword_expr()?,
		search_fields: config.search_fields.clone(),
		enforce_keywords: config.enforce_keywords,
	})
}

/// Runs one vector search for a window. A timeout yields an empty recall; store errors are fatal.
/// Chunks dated outside the window or scored below the query's floor are dropped.
async fn recall_window(
	ctx: &StrategyContext,
	query: SimilarityQuery,
	window: YearWindow,
) -> Result<Recall> {
	let min_score = query.min_score;
	let chunks = match timeout(ctx.gateway_timeout, ctx.store.similarity_search(&query)).await {
		Ok(result) => result?,
		Err(_) => {
			tracing::warn!(
				window = %window,
				timeout_ms = ctx.gateway_timeout.as_millis() as u64,
				"Vector store timed out for window; skipping it."
			);

			return Ok(Recall { chunks: Vec::new(), timed_out: true });
		},
	};
	let mut kept = Vec::with_capacity(chunks.len());

	for mut scored in chunks {
		if !window.contains(scored.date()) {
			tracing::warn!(
				window = %window,
				chunk_id = %scored.chunk.id,
				date = %scored.date(),
				"Dropping chunk dated outside its window."
			);

			continue;
		}
		if min_score.is_some_and(|min| scored.vector_score < min) {
			tracing::debug!(
				window = %window,
				chunk_id = %scored.chunk.id,
				score = scored.vector_score,
				"Dropping chunk below the recall floor."
			);

			continue;
		}

		scored.chunk.metadata.window = Some(window);

		kept.push(scored);
	}

	Ok(Recall { chunks: kept, timed_out: false })
}

/// Runs `task` for every window with at most `ctx.window_concurrency` in flight and returns the
/// outcomes in window order. The first error aborts the remaining tasks.
async fn run_windows<F, Fut>(
	ctx: &StrategyContext,
	windows: Vec<YearWindow>,
	progress: &dyn SearchProgress,
	task: F,
) -> Result<Vec<WindowOutcome>>
where
	F: Fn(YearWindow) -> Fut,
	Fut: Future<Output = Result<WindowOutcome>> + Send + 'static,
{
	let total = windows.len();
	let mut outcomes: Vec<Option<WindowOutcome>> = (0..total).map(|_| None).collect();
	let mut pending = windows.into_iter();
	let mut tasks = JoinSet::new();
	let mut done = 0;

	for window in pending.by_ref().take(ctx.window_concurrency.max(1)) {
		let index = window.index;
		let fut = task(window);

		tasks.spawn(async move { (index, fut.await) });
	}

	while let Some(joined) = tasks.join_next().await {
		let (index, outcome) = match joined {
			Ok(joined) => joined,
			Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
			Err(err) =>
				return Err(Error::Cancelled { message: format!("Window task aborted: {err}") }),
		};
		let outcome = outcome?;

		done += 1;

		progress.report(
			done as f32 / total as f32,
			&format!("Window {} returned {} chunks.", outcome.report.window, outcome.chunks.len()),
		);

		if let Some(slot) = outcomes.get_mut(index) {
			*slot = Some(outcome);
		}
		if let Some(window) = pending.next() {
			let index = window.index;
			let fut = task(window);

			tasks.spawn(async move { (index, fut.await) });
		}
	}

	Ok(outcomes.into_iter().flatten().collect())
}

/// Concatenates window outcomes earliest first, keeping the first occurrence of a chunk id.
fn assemble(outcomes: Vec<WindowOutcome>) -> (Vec<ScoredChunk>, Vec<WindowReport>) {
	let mut seen = HashSet::new();
	let mut chunks = Vec::new();
	let mut reports = Vec::with_capacity(outcomes.len());

	for WindowOutcome { chunks: window_chunks, mut report } in outcomes {
		report.returned = 0;

		for scored in window_chunks {
			if seen.insert(scored.chunk.id.clone()) {
				chunks.push(scored);
				report.returned += 1;
			}
		}

		reports.push(report);
	}

	(chunks, reports)
}
