mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Analysis, Archive, Config, EmbeddingProviderConfig, LexiconProviderConfig,
	LlmProviderConfig, PayloadFields, Prompts, Providers, Qdrant, RequestStyle, Search, Service,
	Storage,
};

use std::{collections::HashSet, fs, path::Path};

impl Config {
	pub fn model(&self, id: &str) -> Option<&LlmProviderConfig> {
		self.providers.generation.iter().find(|model| model.id == id)
	}

	pub fn model_ids(&self) -> Vec<String> {
		self.providers.generation.iter().map(|model| model.id.clone()).collect()
	}
}

impl Qdrant {
	pub fn collection_for(&self, chunk_size: u32) -> String {
		format!("{}_{chunk_size}", self.collection_prefix)
	}
}

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::validation("service.http_bind must be non-empty."));
	}
	if cfg.storage.qdrant.collection_prefix.trim().is_empty() {
		return Err(Error::validation("storage.qdrant.collection_prefix must be non-empty."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::validation(
			"providers.embedding.dimensions must be greater than zero.",
		));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::validation(
			"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
		));
	}

	validate_archive(cfg)?;
	validate_generation(cfg)?;

	if cfg.search.top_k == 0 {
		return Err(Error::validation("search.top_k must be greater than zero."));
	}
	if !cfg.search.min_relevance_score.is_finite() {
		return Err(Error::validation("search.min_relevance_score must be a finite number."));
	}

	for (label, value) in [
		("search.time_window_size", cfg.search.time_window_size),
		("search.chunks_per_window", cfg.search.chunks_per_window),
		("search.window_concurrency", cfg.search.window_concurrency),
		("search.expansion_top_n", cfg.search.expansion_top_n),
		("agent.time_window_size", cfg.agent.time_window_size),
		("agent.chunks_per_window_initial", cfg.agent.chunks_per_window_initial),
		("agent.chunks_per_window_final", cfg.agent.chunks_per_window_final),
		("agent.judge_concurrency", cfg.agent.judge_concurrency),
		("agent.max_chunk_chars", cfg.agent.max_chunk_chars),
	] {
		if value == 0 {
			return Err(Error::validation(format!("{label} must be greater than zero.")));
		}
	}
	for (label, value) in [
		("search.gateway_timeout_ms", cfg.search.gateway_timeout_ms),
		("search.request_timeout_ms", cfg.search.request_timeout_ms),
		("agent.judge_timeout_ms", cfg.agent.judge_timeout_ms),
		("analysis.timeout_ms", cfg.analysis.timeout_ms),
	] {
		if value == 0 {
			return Err(Error::validation(format!("{label} must be greater than zero.")));
		}
	}

	if !cfg.agent.min_retrieval_score.is_finite() {
		return Err(Error::validation("agent.min_retrieval_score must be a finite number."));
	}

	for (label, value) in [
		("agent.temperature", cfg.agent.temperature),
		("analysis.temperature", cfg.analysis.temperature),
	] {
		if !(0.0..=2.0).contains(&value) {
			return Err(Error::validation(format!("{label} must be in the range 0.0-2.0.")));
		}
	}

	for (label, id) in [
		("agent.default_model", &cfg.agent.default_model),
		("analysis.default_model", &cfg.analysis.default_model),
	] {
		if cfg.model(id).is_none() {
			return Err(Error::validation(format!(
				"{label} must name a model listed in providers.generation."
			)));
		}
	}

	if cfg.prompts.answer.trim().is_empty() {
		return Err(Error::validation("prompts.answer must be non-empty."));
	}
	if cfg.prompts.judge.trim().is_empty() {
		return Err(Error::validation("prompts.judge must be non-empty."));
	}

	Ok(())
}

fn validate_archive(cfg: &Config) -> Result<()> {
	let archive = &cfg.archive;

	if archive.min_year > archive.max_year {
		return Err(Error::validation("archive.min_year must not exceed archive.max_year."));
	}
	if archive.chunk_sizes.is_empty() {
		return Err(Error::validation("archive.chunk_sizes must be non-empty."));
	}
	if archive.chunk_sizes.contains(&0) {
		return Err(Error::validation("archive.chunk_sizes must be greater than zero."));
	}
	if !archive.chunk_sizes.contains(&archive.default_chunk_size) {
		return Err(Error::validation(
			"archive.default_chunk_size must be one of archive.chunk_sizes.",
		));
	}
	if archive.search_fields.is_empty() {
		return Err(Error::validation("archive.search_fields must be non-empty."));
	}
	if archive.default_search_fields.is_empty() {
		return Err(Error::validation("archive.default_search_fields must be non-empty."));
	}
	if let Some(field) =
		archive.default_search_fields.iter().find(|field| !archive.search_fields.contains(field))
	{
		return Err(Error::validation(format!(
			"archive.default_search_fields contains {field:?}, which is not in archive.search_fields."
		)));
	}

	Ok(())
}

fn validate_generation(cfg: &Config) -> Result<()> {
	if cfg.providers.generation.is_empty() {
		return Err(Error::validation("providers.generation must list at least one model."));
	}

	let mut seen = HashSet::new();

	for model in &cfg.providers.generation {
		if model.id.trim().is_empty() {
			return Err(Error::validation("providers.generation.id must be non-empty."));
		}
		if !seen.insert(model.id.as_str()) {
			return Err(Error::validation(format!(
				"providers.generation contains duplicate id {:?}.",
				model.id
			)));
		}
		if model.api_key.trim().is_empty() {
			return Err(Error::validation(format!(
				"Provider generation {} api_key must be non-empty.",
				model.id
			)));
		}
		if model.timeout_ms == 0 {
			return Err(Error::validation(format!(
				"Provider generation {} timeout_ms must be greater than zero.",
				model.id
			)));
		}
	}

	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::validation("Provider embedding api_key must be non-empty."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.archive.chunk_sizes.sort_unstable();
	cfg.archive.chunk_sizes.dedup();

	if cfg
		.providers
		.lexicon
		.as_ref()
		.map(|lexicon| lexicon.api_base.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.lexicon = None;
	}

	for model in &mut cfg.providers.generation {
		if model.display_name.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false) {
			model.display_name = None;
		}
	}
}
