use std::time::Instant;

use annal_domain::{SearchConfig, SearchMetadata, SearchResult, StrategyKind, WindowReport, chunk};

use crate::{
	Result, SearchProgress,
	strategy::{self, StrategyContext, WindowOutcome},
};

pub(super) async fn run(
	ctx: &StrategyContext,
	config: &SearchConfig,
	width: u32,
	chunks_per_window: u32,
	progress: &dyn SearchProgress,
) -> Result<SearchResult> {
	let started = Instant::now();
	let windows = config.year_range.windows(width)?;

	progress.report(0.0, &format!("Searching {} windows of {width} years.", windows.len()));

	let outcomes = strategy::run_windows(ctx, windows, progress, |window| {
		let ctx = ctx.clone();
		let query = strategy::window_query(
			config,
			&window,
			chunks_per_window,
			config.min_relevance_score,
		);

		async move {
			let recall = strategy::recall_window(&ctx, query?, window).await?;
			let mut report = WindowReport::new(window);
			let mut chunks = recall.chunks;

			report.retrieved = chunks.len();
			report.recall_timed_out = recall.timed_out;

			chunk::sort_ranked(&mut chunks);
			chunks.truncate(chunks_per_window as usize);

			Ok(WindowOutcome { chunks, report })
		}
	})
	.await?;
	let (chunks, reports) = strategy::assemble(outcomes);
	let mut metadata = SearchMetadata::echo(StrategyKind::TimeWindow, config);

	metadata.search_time_ms = started.elapsed().as_millis() as u64;
	metadata.windows = reports;

	progress.report(1.0, &format!("Found {} chunks.", chunks.len()));

	Ok(SearchResult { chunks, metadata })
}
