use std::time::Instant;

use tokio::time::timeout;

use annal_domain::{SearchConfig, SearchMetadata, SearchResult, StrategyKind, chunk};

use crate::{Error, Result, SearchProgress, SimilarityQuery, strategy::StrategyContext};

pub(super) async fn run(
	ctx: &StrategyContext,
	config: &SearchConfig,
	progress: &dyn SearchProgress,
) -> Result<SearchResult> {
	let started = Instant::now();

	progress.report(0.0, "Searching the archive.");

	let query = SimilarityQuery {
		query: config.query.clone(),
		chunk_size: config.chunk_size,
		limit: config.top_k,
		year_range: Some(config.year_range),
		min_score: Some(config.min_relevance_score),
		keywords: config.keyword_expr()?,
		search_fields: config.search_fields.clone(),
		enforce_keywords: config.enforce_keywords,
	};
	let mut chunks = match timeout(ctx.gateway_timeout, ctx.store.similarity_search(&query)).await {
		Ok(result) => result?,
		Err(_) =>
			return Err(Error::Unavailable {
				message: format!(
					"Vector store did not answer within {} ms.",
					ctx.gateway_timeout.as_millis()
				),
			}),
	};

	chunks.retain(|scored| {
		let inside = config.year_range.contains(scored.date());

		if !inside {
			tracing::warn!(
				chunk_id = %scored.chunk.id,
				date = %scored.date(),
				year_range = %config.year_range,
				"Dropping chunk dated outside the requested years."
			);
		}

		inside
	});
	chunk::sort_ranked(&mut chunks);
	chunks.truncate(config.top_k as usize);

	let mut metadata = SearchMetadata::echo(StrategyKind::Standard, config);

	metadata.search_time_ms = started.elapsed().as_millis() as u64;

	progress.report(1.0, &format!("Found {} chunks.", chunks.len()));

	Ok(SearchResult { chunks, metadata })
}
