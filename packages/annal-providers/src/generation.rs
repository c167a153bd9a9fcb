//! Text generation against chat-completions and messages style backends.

use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use annal_config::{LlmProviderConfig, RequestStyle};

use crate::{Error, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 4_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
	pub system_prompt: String,
	pub prompt: String,
	pub temperature: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
	pub input_tokens: Option<u64>,
	pub output_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
	pub text: String,
	/// Model name reported by the backend, falling back to the configured one.
	pub model: String,
	pub usage: Usage,
}

pub async fn generate(cfg: &LlmProviderConfig, request: &GenerationRequest) -> Result<Generation> {
	let client = crate::client(cfg.timeout_ms)?;
	let (headers, body) = match cfg.style {
		RequestStyle::Openai => {
			(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?, openai_body(cfg, request))
		},
		RequestStyle::Anthropic => {
			let mut headers = crate::extra_headers(&cfg.default_headers)?;

			headers.insert(HeaderName::from_static("x-api-key"), cfg.api_key.parse()?);
			headers.insert(
				HeaderName::from_static("anthropic-version"),
				HeaderValue::from_static(ANTHROPIC_VERSION),
			);

			(headers, anthropic_body(cfg, request))
		},
	};
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(headers)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	match cfg.style {
		RequestStyle::Openai => parse_openai_response(&cfg.model, json),
		RequestStyle::Anthropic => parse_anthropic_response(&cfg.model, json),
	}
}

fn openai_body(cfg: &LlmProviderConfig, request: &GenerationRequest) -> Value {
	let mut messages = Vec::with_capacity(2);

	if !request.system_prompt.trim().is_empty() {
		messages.push(serde_json::json!({ "role": "system", "content": request.system_prompt }));
	}

	messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": request.temperature,
		"messages": messages,
	});

	if let Some(max_tokens) = cfg.max_tokens {
		body["max_tokens"] = Value::from(max_tokens);
	}

	body
}

fn anthropic_body(cfg: &LlmProviderConfig, request: &GenerationRequest) -> Value {
	let mut body = serde_json::json!({
		"model": cfg.model,
		"max_tokens": cfg.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
		"temperature": request.temperature,
		"messages": [{ "role": "user", "content": request.prompt }],
	});

	if !request.system_prompt.trim().is_empty() {
		body["system"] = Value::from(request.system_prompt.as_str());
	}

	body
}

fn parse_openai_response(configured_model: &str, json: Value) -> Result<Generation> {
	let text = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::response("Generation response is missing choice content."))?;
	let usage = json.get("usage");

	Ok(Generation {
		text: text.to_string(),
		model: reported_model(configured_model, &json),
		usage: Usage {
			input_tokens: usage.and_then(|u| u.get("prompt_tokens")).and_then(Value::as_u64),
			output_tokens: usage.and_then(|u| u.get("completion_tokens")).and_then(Value::as_u64),
		},
	})
}

fn parse_anthropic_response(configured_model: &str, json: Value) -> Result<Generation> {
	let blocks = json
		.get("content")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::response("Generation response is missing content blocks."))?;
	let text = blocks
		.iter()
		.filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
		.filter_map(|block| block.get("text").and_then(Value::as_str))
		.collect::<Vec<_>>()
		.join("");

	if text.is_empty() {
		return Err(Error::response("Generation response has no text block."));
	}

	let usage = json.get("usage");

	Ok(Generation {
		text,
		model: reported_model(configured_model, &json),
		usage: Usage {
			input_tokens: usage.and_then(|u| u.get("input_tokens")).and_then(Value::as_u64),
			output_tokens: usage.and_then(|u| u.get("output_tokens")).and_then(Value::as_u64),
		},
	})
}

fn reported_model(configured_model: &str, json: &Value) -> String {
	json.get("model")
		.and_then(Value::as_str)
		.filter(|model| !model.is_empty())
		.unwrap_or(configured_model)
		.to_string()
}
