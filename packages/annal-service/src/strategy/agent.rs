use std::time::Instant;

use tokio::time::timeout;

use annal_config::LlmProviderConfig;
use annal_domain::{
	AgentSearchConfig, JudgeOutcome, SearchConfig, SearchMetadata, SearchResult, StrategyKind,
	WindowReport, YearWindow, chunk,
};
use annal_providers::generation::GenerationRequest;

use crate::{
	Error, Result, SearchProgress, SimilarityQuery, judge,
	strategy::{self, StrategyContext, WindowOutcome},
};

pub(super) async fn run(
	ctx: &StrategyContext,
	config: &SearchConfig,
	agent: &AgentSearchConfig,
	progress: &dyn SearchProgress,
) -> Result<SearchResult> {
	let started = Instant::now();
	let Some(model) = ctx.judge_model.as_ref() else {
		return Err(Error::invalid(format!("model {:?} is not available.", agent.model)));
	};
	let windows = agent.windows(&config.year_range)?;

	progress.report(0.0, &format!("Recalling and judging {} windows.", windows.len()));

	let outcomes = strategy::run_windows(ctx, windows, progress, |window| {
		let ctx = ctx.clone();
		let model = model.clone();
		let agent = agent.clone();
		let query = strategy::window_query(
			config,
			&window,
			agent.chunks_per_window_initial,
			agent.min_retrieval_score,
		);

		async move { judge_window(ctx, model, agent, query?, window).await }
	})
	.await?;
	let (chunks, reports) = strategy::assemble(outcomes);
	let mut metadata = SearchMetadata::echo(StrategyKind::TimeWindowAgent, config);

	metadata.search_time_ms = started.elapsed().as_millis() as u64;
	metadata.windows = reports;
	metadata.agent = Some(agent.clone());

	progress.report(1.0, &format!("Found {} chunks.", chunks.len()));

	Ok(SearchResult { chunks, metadata })
}

/// Recall then judge one window. Judge failures leave the window's chunks unjudged; only vector
/// store errors fail the window.
async fn judge_window(
	ctx: StrategyContext,
	model: LlmProviderConfig,
	agent: AgentSearchConfig,
	query: SimilarityQuery,
	window: YearWindow,
) -> Result<WindowOutcome> {
	let query_text = query.query.clone();
	let recall = strategy::recall_window(&ctx, query, window).await?;
	let mut report = WindowReport::new(window);
	let mut candidates = recall.chunks;

	report.retrieved = candidates.len();
	report.recall_timed_out = recall.timed_out;

	if candidates.is_empty() {
		report.judge = JudgeOutcome::Skipped;

		return Ok(WindowOutcome { chunks: candidates, report });
	}

	let request = GenerationRequest {
		system_prompt: agent.system_prompt.clone(),
		prompt: judge::build_prompt(&query_text, &candidates, ctx.max_chunk_chars),
		temperature: agent.temperature,
	};
	let verdicts = {
		let _permit = ctx.judge_gate.acquire().await.map_err(|_| Error::Cancelled {
			message: "Judge gate is closed.".to_string(),
		})?;

		match timeout(ctx.judge_timeout, ctx.generation.generate(&model, &request)).await {
			Ok(Ok(generation)) => judge::parse_reply(&generation.text, candidates.len())
				.map_err(|err| err.to_string()),
			Ok(Err(err)) => Err(format!("Judge call failed: {err}")),
			Err(_) =>
				Err(format!("Judge call timed out after {} ms.", ctx.judge_timeout.as_millis())),
		}
	};

	match verdicts {
		Ok(verdicts) => {
			let applied = judge::apply_verdicts(&mut candidates, &verdicts);

			if applied.omitted > 0 {
				tracing::debug!(
					window = %window,
					omitted = applied.omitted,
					"Judge reply omitted some candidates."
				);
			}

			report.judge =
				JudgeOutcome::Judged { evaluated: applied.evaluated, omitted: applied.omitted };
		},
		Err(reason) => {
			tracing::warn!(
				window = %window,
				model = %model.id,
				reason = %reason,
				"Judging failed for window; keeping vector scores."
			);

			judge::mark_unjudged(&mut candidates, &reason);

			report.judge = JudgeOutcome::Failed { reason };
		},
	}

	chunk::sort_ranked(&mut candidates);
	candidates.truncate(agent.chunks_per_window_final as usize);

	Ok(WindowOutcome { chunks: candidates, report })
}
