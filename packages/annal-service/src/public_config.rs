use serde::{Deserialize, Serialize};

use crate::AnnalService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
	pub id: String,
	pub display_name: String,
}

/// Settings clients need to build requests. Carries no endpoints or keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicConfig {
	pub models: Vec<ModelInfo>,
	pub default_model: String,
	pub chunk_sizes: Vec<u32>,
	pub default_chunk_size: u32,
	pub min_year: i32,
	pub max_year: i32,
	pub search_fields: Vec<String>,
	pub default_search_fields: Vec<String>,
	pub prompt_templates: Vec<String>,
	pub keyword_expansion: bool,
}

impl AnnalService {
	pub fn public_config(&self) -> PublicConfig {
		let cfg = &self.cfg;

		PublicConfig {
			models: cfg
				.providers
				.generation
				.iter()
				.map(|model| ModelInfo {
					id: model.id.clone(),
					display_name: model.display_name().to_string(),
				})
				.collect(),
			default_model: cfg.agent.default_model.clone(),
			chunk_sizes: cfg.archive.chunk_sizes.clone(),
			default_chunk_size: cfg.archive.default_chunk_size,
			min_year: cfg.archive.min_year,
			max_year: cfg.archive.max_year,
			search_fields: cfg.archive.search_fields.clone(),
			default_search_fields: cfg.archive.default_search_fields.clone(),
			prompt_templates: cfg.prompts.names(),
			keyword_expansion: cfg.providers.lexicon.is_some(),
		}
	}
}
