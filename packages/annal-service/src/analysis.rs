//! Answer synthesis over chunks a client selected from earlier retrievals.

use std::{
	fmt::Write,
	time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::timeout;

use annal_providers::generation::GenerationRequest;

use crate::{AnnalService, Error, Result, request};

pub const MAX_QUESTION_CHARS: usize = 10_000;
pub const MAX_ANALYSIS_CHUNKS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisChunk {
	pub content: String,
	/// Chunk metadata as returned by retrieval; `title` and `date` are used when present.
	#[serde(default)]
	pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
	#[serde(alias = "user_prompt")]
	pub question: String,
	#[serde(alias = "chunks_to_analyze")]
	pub chunks: Vec<AnalysisChunk>,
	#[serde(default, alias = "model_selection")]
	pub model: Option<String>,
	/// Overrides `template` when non-blank.
	#[serde(default, alias = "system_prompt_text")]
	pub system_prompt: Option<String>,
	/// Name of a configured prompt. Defaults to the answer prompt, also reachable as "default".
	#[serde(default, alias = "system_prompt_template")]
	pub template: Option<String>,
	#[serde(default)]
	pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
	pub model_used: String,
	pub analysis_time_ms: u64,
	pub chunks_analyzed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
	pub answer: String,
	pub metadata: AnalysisMetadata,
}

impl AnnalService {
	pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse> {
		let started = Instant::now();
		let question = request.question.trim();

		if question.is_empty() {
			return Err(Error::invalid("question must be non-empty."));
		}
		if question.chars().count() > MAX_QUESTION_CHARS {
			return Err(Error::invalid(format!(
				"question must be at most {MAX_QUESTION_CHARS} characters."
			)));
		}
		if request.chunks.is_empty() || request.chunks.len() > MAX_ANALYSIS_CHUNKS {
			return Err(Error::invalid(format!(
				"chunks must contain between 1 and {MAX_ANALYSIS_CHUNKS} entries, got {}.",
				request.chunks.len()
			)));
		}
		if let Some(index) = request.chunks.iter().position(|chunk| chunk.content.trim().is_empty())
		{
			return Err(Error::invalid(format!("chunks[{index}].content must be non-empty.")));
		}

		let model_id = request
			.model
			.as_deref()
			.map(str::trim)
			.filter(|model| !model.is_empty())
			.unwrap_or(&self.cfg.analysis.default_model);
		let Some(model) = self.cfg.model(model_id) else {
			return Err(Error::invalid(format!("model {model_id:?} is not available.")));
		};
		let system_prompt = self.system_prompt(&request)?;
		let temperature =
			request::temperature(request.temperature.unwrap_or(self.cfg.analysis.temperature))?;
		let generation_request = GenerationRequest {
			system_prompt,
			prompt: build_prompt(question, &request.chunks, &self.cfg.storage.qdrant.payload),
			temperature,
		};

		tracing::info!(model = %model.id, chunks = request.chunks.len(), "Analysis started.");

		let limit = Duration::from_millis(self.cfg.analysis.timeout_ms);
		let generation =
			match timeout(limit, self.providers.generation.generate(model, &generation_request))
				.await
			{
				Ok(result) => result?,
				Err(_) =>
					return Err(Error::Unavailable {
						message: format!(
							"Model {} did not answer within {} ms.",
							model.id, self.cfg.analysis.timeout_ms
						),
					}),
			};
		let analysis_time_ms = started.elapsed().as_millis() as u64;

		tracing::info!(model = %model.id, analysis_time_ms, "Analysis finished.");

		Ok(AnalysisResponse {
			answer: generation.text,
			metadata: AnalysisMetadata {
				model_used: model.id.clone(),
				analysis_time_ms,
				chunks_analyzed_count: request.chunks.len(),
			},
		})
	}

	fn system_prompt(&self, request: &AnalysisRequest) -> Result<String> {
		if let Some(prompt) = request.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
			return Ok(prompt.to_string());
		}

		let prompts = &self.cfg.prompts;

		match request.template.as_deref().map(str::trim) {
			None | Some("") | Some("answer") | Some("default") => Ok(prompts.answer.clone()),
			Some("judge") => Ok(prompts.judge.clone()),
			Some(name) => prompts
				.templates
				.get(name)
				.cloned()
				.ok_or_else(|| Error::invalid(format!("prompt template {name:?} does not exist."))),
		}
	}
}

/// Question followed by the numbered excerpts, each headed by title and date.
pub fn build_prompt(
	question: &str,
	chunks: &[AnalysisChunk],
	payload: &annal_config::PayloadFields,
) -> String {
	let mut context = String::new();

	for (index, chunk) in chunks.iter().enumerate() {
		let title = metadata_text(&chunk.metadata, &["title", &payload.title]);
		let date = metadata_text(&chunk.metadata, &["date", &payload.date]);

		if index > 0 {
			context.push('\n');
		}

		let _ = writeln!(context, "[{}] {} ({})", index + 1, title, date);
		let _ = writeln!(context, "{}", chunk.content.trim());
	}

	format!("{question}\n\nTextauszüge:\n{context}")
}

fn metadata_text(metadata: &Map<String, Value>, keys: &[&str]) -> String {
	keys.iter()
		.find_map(|key| match metadata.get(*key) {
			Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
			Some(Value::Number(number)) => Some(number.to_string()),
			_ => None,
		})
		.unwrap_or_else(|| "unbekannt".to_string())
}
