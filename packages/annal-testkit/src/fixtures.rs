use std::sync::Arc;

use serde_json::Map;
use time::Date;

use annal_config::Config;
use annal_domain::{Chunk, ChunkMetadata, ScoredChunk};
use annal_service::{AnnalService, Providers};

use crate::{
	Result,
	fakes::{MemoryVectorStore, ScriptedGenerator, StaticEmbedding, StaticLexicon},
};

pub const EXAMPLE_CONFIG_TOML: &str = include_str!("../../../annal.example.toml");

/// The example configuration, parsed and validated.
pub fn test_config() -> Result<Config> {
	let cfg: Config = toml::from_str(EXAMPLE_CONFIG_TOML)?;

	annal_config::validate(&cfg)?;

	Ok(cfg)
}

pub fn chunk(id: &str, title: &str, date: Date, text: &str, score: f32) -> ScoredChunk {
	ScoredChunk::new(
		Chunk {
			id: id.to_string(),
			text: text.to_string(),
			metadata: ChunkMetadata {
				title: title.to_string(),
				date,
				url: None,
				window: None,
				keyword_hits: Vec::new(),
				extra: Map::new(),
			},
		},
		score,
	)
}

pub fn providers(generator: Arc<ScriptedGenerator>, lexicon: Arc<StaticLexicon>) -> Providers {
	Providers::new(Arc::new(StaticEmbedding), generator, lexicon)
}

/// A service over in-memory collaborators.
pub fn service(
	cfg: Config,
	store: Arc<MemoryVectorStore>,
	generator: Arc<ScriptedGenerator>,
	lexicon: Arc<StaticLexicon>,
) -> AnnalService {
	AnnalService::with_collaborators(cfg, store, providers(generator, lexicon))
}
