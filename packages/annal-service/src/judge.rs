//! Relevance judging of one window's candidates with a generation model.
//!
//! Candidates are numbered from 1 in the prompt. The reply must contain a JSON object
//! `{"evaluations":[{"id":n,"score":0-10,"justification":"..."}]}`; code fences and prose around
//! it are ignored, and the first JSON object found is used.

use std::{collections::BTreeMap, fmt::Write};

use serde_json::Value;

use annal_domain::{Evaluation, ScoredChunk};

pub const MAX_SCORE: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
	pub score: f32,
	pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
	#[error("Judge reply contains no JSON object.")]
	NoJson,
	#[error("Judge reply has no evaluations array.")]
	MissingEvaluations,
}

/// Counts of an applied judge reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
	pub evaluated: usize,
	pub omitted: usize,
}

pub fn build_prompt(query: &str, candidates: &[ScoredChunk], max_chunk_chars: usize) -> String {
	let mut prompt = String::new();

	let _ = writeln!(prompt, "Suchanfrage: {query}");
	let _ = writeln!(prompt);
	let _ =
		writeln!(prompt, "Bewerte die Relevanz der folgenden {} Textauszüge.", candidates.len());

	for (index, scored) in candidates.iter().enumerate() {
		let metadata = &scored.chunk.metadata;

		let _ = writeln!(prompt);
		let _ = writeln!(prompt, "[{}] {} ({})", index + 1, metadata.title, metadata.date);
		let _ = writeln!(prompt, "{}", truncate_chars(&scored.chunk.text, max_chunk_chars));
	}

	let _ = writeln!(prompt);
	let _ = write!(
		prompt,
		"Antworte ausschließlich mit JSON im Format \
		 {{\"evaluations\":[{{\"id\":1,\"score\":0-10,\"justification\":\"...\"}}]}}."
	);

	prompt
}

/// Extracts verdicts keyed by candidate number. Entries with ids outside `1..=candidates` or
/// without a numeric score are ignored; the first entry for an id wins.
pub fn parse_reply(
	reply: &str,
	candidates: usize,
) -> Result<BTreeMap<usize, Verdict>, ParseError> {
	let object = first_json_object(reply).ok_or(ParseError::NoJson)?;
	let evaluations = object
		.get("evaluations")
		.and_then(Value::as_array)
		.ok_or(ParseError::MissingEvaluations)?;
	let mut out = BTreeMap::new();

	for item in evaluations {
		let Some(id) = item.get("id").and_then(as_index) else {
			continue;
		};

		if id == 0 || id > candidates || out.contains_key(&id) {
			continue;
		}

		let Some(score) = item.get("score").and_then(as_score) else {
			continue;
		};
		let justification = item
			.get("justification")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.trim()
			.to_string();

		out.insert(id, Verdict { score: score.clamp(0.0, MAX_SCORE), justification });
	}

	Ok(out)
}

/// Attaches verdicts to candidates in prompt order. Candidates without a verdict are unjudged.
pub fn apply_verdicts(
	candidates: &mut [ScoredChunk],
	verdicts: &BTreeMap<usize, Verdict>,
) -> Applied {
	let mut applied = Applied { evaluated: 0, omitted: 0 };

	for (index, scored) in candidates.iter_mut().enumerate() {
		match verdicts.get(&(index + 1)) {
			Some(verdict) => {
				scored.evaluation = Evaluation::Judged {
					score: verdict.score,
					justification: verdict.justification.clone(),
				};
				applied.evaluated += 1;
			},
			None => {
				scored.evaluation =
					Evaluation::Unjudged { reason: "Omitted from the judge reply.".to_string() };
				applied.omitted += 1;
			},
		}
	}

	applied
}

pub fn mark_unjudged(candidates: &mut [ScoredChunk], reason: &str) {
	for scored in candidates {
		scored.evaluation = Evaluation::Unjudged { reason: reason.to_string() };
	}
}

fn first_json_object(reply: &str) -> Option<Value> {
	for (offset, _) in reply.match_indices('{') {
		let mut stream = serde_json::Deserializer::from_str(&reply[offset..]).into_iter::<Value>();

		if let Some(Ok(value @ Value::Object(_))) = stream.next() {
			return Some(value);
		}
	}

	None
}

fn as_index(value: &Value) -> Option<usize> {
	match value {
		Value::Number(number) => number.as_u64().map(|n| n as usize),
		Value::String(text) =>
			text.trim().trim_start_matches('[').trim_end_matches(']').parse().ok(),
		_ => None,
	}
}

fn as_score(value: &Value) -> Option<f32> {
	let score = match value {
		Value::Number(number) => number.as_f64()?,
		Value::String(text) => text.trim().parse().ok()?,
		_ => return None,
	};

	score.is_finite().then_some(score as f32)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((cut, _)) => format!("{}…", &text[..cut]),
		None => text.to_string(),
	}
}
