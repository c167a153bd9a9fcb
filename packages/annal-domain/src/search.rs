use serde::{Deserialize, Serialize};

use crate::{
	Error, Result,
	chunk::ScoredChunk,
	keywords::KeywordExpr,
	years::{YearRange, YearWindow},
};

/// Request-scoped search parameters. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
	pub query: String,
	pub year_range: YearRange,
	/// Granularity of the indexed passages; selects the collection.
	pub chunk_size: u32,
	#[serde(default)]
	pub keywords: Option<String>,
	#[serde(default, alias = "search_in")]
	pub search_fields: Vec<String>,
	#[serde(default)]
	pub enforce_keywords: bool,
	pub top_k: u32,
	pub min_relevance_score: f32,
}
impl SearchConfig {
	/// Rejects configurations no strategy can run: a blank query or a malformed keyword
	/// expression. Inverted year ranges cannot be constructed.
	pub fn validate(&self) -> Result<()> {
		if self.query.trim().is_empty() {
			return Err(Error::EmptyQuery);
		}

		self.keyword_expr()?;

		Ok(())
	}

	pub fn keyword_expr(&self) -> Result<Option<KeywordExpr>> {
		match self.keywords.as_deref() {
			Some(raw) => KeywordExpr::parse(raw),
			None => Ok(None),
		}
	}
}

/// Parameters of the judge-assisted strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSearchConfig {
	/// When false the whole year range is a single window.
	pub use_time_windows: bool,
	pub time_window_size: u32,
	/// Recall budget per window, before judging.
	pub chunks_per_window_initial: u32,
	/// Cap per window after judging.
	pub chunks_per_window_final: u32,
	pub model: String,
	#[serde(default, skip_serializing)]
	pub system_prompt: String,
	/// Vector score floor applied during recall.
	pub min_retrieval_score: f32,
	pub temperature: f32,
}
impl AgentSearchConfig {
	pub fn windows(&self, range: &YearRange) -> Result<Vec<YearWindow>> {
		if self.use_time_windows {
			range.windows(self.time_window_size)
		} else {
			Ok(vec![range.as_window()])
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
	Standard,
	TimeWindow,
	TimeWindowAgent,
}
impl StrategyKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Standard => "standard",
			Self::TimeWindow => "time_window",
			Self::TimeWindowAgent => "time_window_agent",
		}
	}
}

/// How judging went for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JudgeOutcome {
	NotRequested,
	/// Recall produced no candidates, so the judge was not called.
	Skipped,
	Judged {
		evaluated: usize,
		omitted: usize,
	},
	/// The judge call failed; every candidate of the window is unjudged.
	Failed {
		reason: String,
	},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
	pub window: YearWindow,
	/// Candidates returned by the vector store for this window.
	pub retrieved: usize,
	/// Chunks this window contributed to the result.
	pub returned: usize,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub recall_timed_out: bool,
	pub judge: JudgeOutcome,
}
impl WindowReport {
	pub fn new(window: YearWindow) -> Self {
		Self {
			window,
			retrieved: 0,
			returned: 0,
			recall_timed_out: false,
			judge: JudgeOutcome::NotRequested,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
	pub strategy: StrategyKind,
	pub search_time_ms: u64,
	pub query: String,
	pub year_range: YearRange,
	pub chunk_size: u32,
	pub keywords: Option<String>,
	pub search_fields: Vec<String>,
	pub enforce_keywords: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub windows: Vec<WindowReport>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub agent: Option<AgentSearchConfig>,
}
impl SearchMetadata {
	pub fn echo(strategy: StrategyKind, config: &SearchConfig) -> Self {
		Self {
			strategy,
			search_time_ms: 0,
			query: config.query.clone(),
			year_range: config.year_range,
			chunk_size: config.chunk_size,
			keywords: config.keywords.clone(),
			search_fields: config.search_fields.clone(),
			enforce_keywords: config.enforce_keywords,
			windows: Vec::new(),
			agent: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
	pub chunks: Vec<ScoredChunk>,
	pub metadata: SearchMetadata,
}
