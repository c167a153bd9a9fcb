use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use annal_config::LexiconProviderConfig;

use crate::{Error, Result};

/// A neighbour of a term in the word-embedding space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarWord {
	pub word: String,
	pub similarity: f32,
	#[serde(default)]
	pub frequency: u64,
}

pub async fn find_similar_words(
	cfg: &LexiconProviderConfig,
	term: &str,
	top_n: u32,
) -> Result<Vec<SimilarWord>> {
	let client = crate::client(cfg.timeout_ms)?;
	let headers: HeaderMap = if cfg.api_key.trim().is_empty() {
		crate::extra_headers(&cfg.default_headers)?
	} else {
		crate::auth_headers(&cfg.api_key, &cfg.default_headers)?
	};
	let body = serde_json::json!({ "word": term, "top_n": top_n });
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(headers)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_similar_words(json)
}

/// Accepts either a bare array or an object with a `similar_words` array.
fn parse_similar_words(json: Value) -> Result<Vec<SimilarWord>> {
	let items = match json {
		Value::Array(items) => items,
		Value::Object(mut map) => match map.remove("similar_words") {
			Some(Value::Array(items)) => items,
			_ => return Err(Error::response("Lexicon response is missing similar_words array.")),
		},
		_ => return Err(Error::response("Lexicon response must be a JSON array or object.")),
	};
	let mut out = Vec::with_capacity(items.len());

	for item in items {
		out.push(serde_json::from_value(item)?);
	}

	Ok(out)
}
