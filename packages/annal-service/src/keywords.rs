use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use annal_config::LexiconProviderConfig;
use annal_domain::{KeywordExpr, SearchConfig, extract_terms};
use annal_providers::lexicon::SimilarWord;

use crate::{AnnalService, Error, Result, request};

pub const MAX_EXPANSION: u32 = 50;

/// Term to its nearest neighbours in the lexicon, ordered by term.
pub type KeywordExpansion = BTreeMap<String, Vec<SimilarWord>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandRequest {
	pub expression: String,
	#[serde(default = "default_top_n", alias = "factor")]
	pub top_n: u32,
}

impl AnnalService {
	/// Looks up similar words for every bare term of a keyword expression.
	pub async fn expand_keywords(&self, request: ExpandRequest) -> Result<KeywordExpansion> {
		let lexicon = self.lexicon()?;

		if request.expression.chars().count() > request::MAX_KEYWORD_CHARS {
			return Err(Error::invalid(format!(
				"expression must be at most {} characters.",
				request::MAX_KEYWORD_CHARS
			)));
		}
		if request.top_n == 0 || request.top_n > MAX_EXPANSION {
			return Err(Error::invalid(format!(
				"top_n must be between 1 and {MAX_EXPANSION}, got {}.",
				request.top_n
			)));
		}

		let mut expansion = KeywordExpansion::new();

		for term in extract_terms(&request.expression) {
			let words =
				self.providers.lexicon.find_similar_words(lexicon, &term, request.top_n).await?;

			tracing::debug!(term = %term, neighbours = words.len(), "Expanded keyword.");

			expansion.insert(term, words);
		}

		Ok(expansion)
	}

	/// ORs each positive keyword of `config` with up to `top_n` lexicon neighbours. A term whose
	/// lookup fails is searched as written.
	pub(crate) async fn broaden_keywords(
		&self,
		mut config: SearchConfig,
		top_n: u32,
	) -> Result<SearchConfig> {
		let Some(expr) = config.keyword_expr()? else {
			return Ok(config);
		};
		let lexicon = self.lexicon()?;
		let mut neighbours = HashMap::new();

		for term in expr.positive_terms() {
			match self.providers.lexicon.find_similar_words(lexicon, &term, top_n).await {
				Ok(words) => {
					let words = words
						.into_iter()
						.map(|similar| normalize_word(&similar.word))
						.filter(|word| !word.is_empty())
						.collect::<Vec<_>>();

					neighbours.insert(term, words);
				},
				Err(err) => {
					tracing::warn!(term = %term, error = %err, "Keyword neighbour lookup failed.");
				},
			}
		}

		let broadened = expr.broaden(&neighbours).to_string();

		KeywordExpr::parse(&broadened)?;

		tracing::info!(
			keywords = config.keywords.as_deref().unwrap_or_default(),
			broadened = %broadened,
			"Broadened search keywords."
		);

		config.keywords = Some(broadened);

		Ok(config)
	}

	fn lexicon(&self) -> Result<&LexiconProviderConfig> {
		self.cfg.providers.lexicon.as_ref().ok_or_else(|| Error::Unavailable {
			message: "No lexicon service is configured.".to_string(),
		})
	}
}

/// Lowercased with quotes dropped and inner whitespace collapsed, as the keyword parser would
/// read it back.
fn normalize_word(word: &str) -> String {
	word.replace('"', "").split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn default_top_n() -> u32 {
	5
}
