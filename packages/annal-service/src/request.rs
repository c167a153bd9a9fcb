//! Raw retrieval requests and their validation against the configured archive.

use serde::{Deserialize, Serialize};

use annal_config::Config;
use annal_domain::{AgentSearchConfig, KeywordExpr, SearchConfig, YearRange};

use crate::{Error, Result, keywords::MAX_EXPANSION, strategy::Strategy};

pub const MAX_QUERY_CHARS: usize = 10_000;
pub const MAX_KEYWORD_CHARS: usize = 5_000;
pub const MAX_TOP_K: u32 = 100;
pub const MAX_WINDOW_WIDTH: u32 = 50;
pub const MAX_CHUNKS_PER_WINDOW: u32 = 50;
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Retrieval request as clients send it. Unset fields fall back to configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalRequest {
	#[serde(alias = "retrieval_query")]
	pub query: String,
	pub year_start: Option<i32>,
	pub year_end: Option<i32>,
	pub chunk_size: Option<u32>,
	pub keywords: Option<String>,
	#[serde(alias = "search_in")]
	pub search_fields: Option<Vec<String>>,
	/// Defaults to enforcing keywords.
	pub enforce_keywords: Option<bool>,
	/// ORs every positive keyword with its lexicon neighbours before searching.
	#[serde(default)]
	pub use_semantic_expansion: bool,
	#[serde(alias = "semantic_expansion_factor")]
	pub expansion_top_n: Option<u32>,
	pub top_k: Option<u32>,
	pub min_relevance_score: Option<f32>,
	#[serde(default)]
	pub use_time_intervals: bool,
	#[serde(alias = "time_interval_size")]
	pub time_window_size: Option<u32>,
	#[serde(alias = "chunks_per_interval")]
	pub chunks_per_window: Option<u32>,
	/// Selects the judge-assisted strategy and overrides `use_time_intervals`.
	#[serde(default)]
	pub use_llm_assistance: bool,
	#[serde(default)]
	pub agent: AgentOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOptions {
	pub use_time_windows: Option<bool>,
	pub time_window_size: Option<u32>,
	pub chunks_per_window_initial: Option<u32>,
	pub chunks_per_window_final: Option<u32>,
	pub model: Option<String>,
	pub system_prompt: Option<String>,
	pub min_retrieval_score: Option<f32>,
	pub temperature: Option<f32>,
}

/// A validated request: what to search and how.
#[derive(Debug, Clone)]
pub struct Plan {
	pub config: SearchConfig,
	pub strategy: Strategy,
	/// Neighbours per keyword to add before searching, when expansion applies.
	pub expansion_top_n: Option<u32>,
}

pub fn plan(cfg: &Config, request: &RetrievalRequest) -> Result<Plan> {
	let config = search_config(cfg, request)?;
	let strategy = if request.use_llm_assistance {
		Strategy::Agent(agent_config(cfg, &request.agent)?)
	} else if request.use_time_intervals {
		Strategy::TimeWindow {
			width: bounded(
				"time_window_size",
				request.time_window_size.unwrap_or(cfg.search.time_window_size),
				MAX_WINDOW_WIDTH,
			)?,
			chunks_per_window: bounded(
				"chunks_per_window",
				request.chunks_per_window.unwrap_or(cfg.search.chunks_per_window),
				MAX_CHUNKS_PER_WINDOW,
			)?,
		}
	} else {
		Strategy::Standard
	};

	let expansion_top_n = match (&config.keywords, request.use_semantic_expansion) {
		(Some(_), true) => Some(bounded(
			"expansion_top_n",
			request.expansion_top_n.unwrap_or(cfg.search.expansion_top_n),
			MAX_EXPANSION,
		)?),
		_ => None,
	};

	Ok(Plan { config, strategy, expansion_top_n })
}

fn search_config(cfg: &Config, request: &RetrievalRequest) -> Result<SearchConfig> {
	let query = request.query.trim();

	if query.is_empty() {
		return Err(Error::invalid("query must be non-empty."));
	}
	if query.chars().count() > MAX_QUERY_CHARS {
		return Err(Error::invalid(format!("query must be at most {MAX_QUERY_CHARS} characters.")));
	}

	let year_range = year_range(cfg, request.year_start, request.year_end)?;
	let chunk_size = request.chunk_size.unwrap_or(cfg.archive.default_chunk_size);

	if !cfg.archive.chunk_sizes.contains(&chunk_size) {
		return Err(Error::invalid(format!(
			"chunk_size must be one of {:?}, got {chunk_size}.",
			cfg.archive.chunk_sizes
		)));
	}

	let keywords = request
		.keywords
		.as_deref()
		.map(str::trim)
		.filter(|raw| !raw.is_empty())
		.map(str::to_string);

	if let Some(raw) = &keywords {
		if raw.chars().count() > MAX_KEYWORD_CHARS {
			return Err(Error::invalid(format!(
				"keywords must be at most {MAX_KEYWORD_CHARS} characters."
			)));
		}

		KeywordExpr::parse(raw)?;
	}

	let search_fields = match &request.search_fields {
		Some(fields) if !fields.is_empty() => fields.clone(),
		_ => cfg.archive.default_search_fields.clone(),
	};

	if let Some(field) = search_fields.iter().find(|field| !cfg.archive.search_fields.contains(field))
	{
		return Err(Error::invalid(format!("search field {field:?} is not searchable.")));
	}

	let top_k = bounded("top_k", request.top_k.unwrap_or(cfg.search.top_k), MAX_TOP_K)?;
	let min_relevance_score = request.min_relevance_score.unwrap_or(cfg.search.min_relevance_score);

	if !min_relevance_score.is_finite() {
		return Err(Error::invalid("min_relevance_score must be a finite number."));
	}

	Ok(SearchConfig {
		query: query.to_string(),
		year_range,
		chunk_size,
		keywords,
		search_fields,
		enforce_keywords: request.enforce_keywords.unwrap_or(true),
		top_k,
		min_relevance_score,
	})
}

fn year_range(cfg: &Config, start: Option<i32>, end: Option<i32>) -> Result<YearRange> {
	let start = start.unwrap_or(cfg.archive.min_year);
	let end = end.unwrap_or(cfg.archive.max_year);

	for (label, year) in [("year_start", start), ("year_end", end)] {
		if !(cfg.archive.min_year..=cfg.archive.max_year).contains(&year) {
			return Err(Error::invalid(format!(
				"{label} must be between {} and {}, got {year}.",
				cfg.archive.min_year, cfg.archive.max_year
			)));
		}
	}

	Ok(YearRange::new(start, end)?)
}

fn agent_config(cfg: &Config, options: &AgentOptions) -> Result<AgentSearchConfig> {
	let model = options
		.model
		.as_deref()
		.map(str::trim)
		.filter(|model| !model.is_empty())
		.unwrap_or(&cfg.agent.default_model)
		.to_string();

	if cfg.model(&model).is_none() {
		return Err(Error::invalid(format!("model {model:?} is not available.")));
	}

	let system_prompt = options
		.system_prompt
		.as_deref()
		.filter(|prompt| !prompt.trim().is_empty())
		.unwrap_or(&cfg.prompts.judge)
		.to_string();
	let min_retrieval_score = options.min_retrieval_score.unwrap_or(cfg.agent.min_retrieval_score);

	if !min_retrieval_score.is_finite() {
		return Err(Error::invalid("min_retrieval_score must be a finite number."));
	}

	Ok(AgentSearchConfig {
		use_time_windows: options.use_time_windows.unwrap_or(true),
		time_window_size: bounded(
			"time_window_size",
			options.time_window_size.unwrap_or(cfg.agent.time_window_size),
			MAX_WINDOW_WIDTH,
		)?,
		chunks_per_window_initial: bounded(
			"chunks_per_window_initial",
			options.chunks_per_window_initial.unwrap_or(cfg.agent.chunks_per_window_initial),
			MAX_CHUNKS_PER_WINDOW,
		)?,
		chunks_per_window_final: bounded(
			"chunks_per_window_final",
			options.chunks_per_window_final.unwrap_or(cfg.agent.chunks_per_window_final),
			MAX_CHUNKS_PER_WINDOW,
		)?,
		model,
		system_prompt,
		min_retrieval_score,
		temperature: temperature(options.temperature.unwrap_or(cfg.agent.temperature))?,
	})
}

pub(crate) fn temperature(value: f32) -> Result<f32> {
	if !(0.0..=MAX_TEMPERATURE).contains(&value) {
		return Err(Error::invalid(format!(
			"temperature must be in the range 0.0-{MAX_TEMPERATURE:.1}, got {value}."
		)));
	}

	Ok(value)
}

fn bounded(label: &str, value: u32, max: u32) -> Result<u32> {
	if value == 0 || value > max {
		return Err(Error::invalid(format!("{label} must be between 1 and {max}, got {value}.")));
	}

	Ok(value)
}
