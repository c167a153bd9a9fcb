use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub archive: Archive,
	pub providers: Providers,
	pub search: Search,
	pub agent: Agent,
	pub analysis: Analysis,
	pub prompts: Prompts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	/// Collections are named "<collection_prefix>_<chunk_size>", one per indexed granularity.
	pub collection_prefix: String,
	pub vector_dim: u32,
	#[serde(default)]
	pub payload: PayloadFields,
}

/// Payload keys of an indexed passage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PayloadFields {
	pub text: String,
	pub title: String,
	pub date: String,
	pub url: String,
	pub year: String,
}
impl Default for PayloadFields {
	fn default() -> Self {
		Self {
			text: "text".to_string(),
			title: "title".to_string(),
			date: "date".to_string(),
			url: "url".to_string(),
			year: "year".to_string(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Archive {
	pub min_year: i32,
	pub max_year: i32,
	pub chunk_sizes: Vec<u32>,
	pub default_chunk_size: u32,
	/// Payload fields that keyword expressions may be matched against.
	pub search_fields: Vec<String>,
	pub default_search_fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub lexicon: Option<LexiconProviderConfig>,
	pub generation: Vec<LlmProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Word-embedding neighbourhood service used for keyword expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct LexiconProviderConfig {
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStyle {
	#[default]
	Openai,
	Anthropic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	/// Stable id clients select the model by, e.g. "hu-llm3".
	pub id: String,
	pub display_name: Option<String>,
	#[serde(default)]
	pub style: RequestStyle,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub max_tokens: Option<u32>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl LlmProviderConfig {
	pub fn display_name(&self) -> &str {
		self.display_name.as_deref().unwrap_or(&self.id)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	pub top_k: u32,
	pub min_relevance_score: f32,
	pub time_window_size: u32,
	pub chunks_per_window: u32,
	#[serde(default = "default_window_concurrency")]
	pub window_concurrency: u32,
	/// Lexicon neighbours added per keyword when a search asks for semantic expansion.
	#[serde(default = "default_expansion_top_n")]
	pub expansion_top_n: u32,
	pub gateway_timeout_ms: u64,
	pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
	pub default_model: String,
	pub time_window_size: u32,
	pub chunks_per_window_initial: u32,
	pub chunks_per_window_final: u32,
	pub min_retrieval_score: f32,
	#[serde(default = "default_judge_temperature")]
	pub temperature: f32,
	pub judge_concurrency: u32,
	pub judge_timeout_ms: u64,
	#[serde(default = "default_max_chunk_chars")]
	pub max_chunk_chars: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Analysis {
	pub default_model: String,
	#[serde(default = "default_analysis_temperature")]
	pub temperature: f32,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prompts {
	/// System prompt for answer synthesis when the caller supplies none.
	pub answer: String,
	/// System prompt for the relevance judge when the caller supplies none.
	pub judge: String,
	/// Additional named system prompts offered to clients.
	#[serde(default)]
	pub templates: BTreeMap<String, String>,
}
impl Prompts {
	pub fn names(&self) -> Vec<String> {
		let mut names = vec!["answer".to_string(), "judge".to_string()];

		names.extend(self.templates.keys().cloned());

		names
	}
}

fn default_window_concurrency() -> u32 {
	4
}

fn default_expansion_top_n() -> u32 {
	3
}

fn default_judge_temperature() -> f32 {
	0.1
}

fn default_analysis_temperature() -> f32 {
	0.3
}

fn default_max_chunk_chars() -> u32 {
	1_500
}
