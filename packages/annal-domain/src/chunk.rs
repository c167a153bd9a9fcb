use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::Date;

use crate::years::YearWindow;

/// Atomic retrievable passage of archive text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
	/// Point id in the vector index.
	pub id: String,
	pub text: String,
	pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
	pub title: String,
	#[serde(with = "crate::date_serde")]
	pub date: Date,
	pub url: Option<String>,
	/// Window the chunk was retrieved for, when windowing was active.
	pub window: Option<YearWindow>,
	/// Positive keyword terms found in the text when keywords were advisory.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub keyword_hits: Vec<String>,
	/// Remaining payload fields, passed through untouched.
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub extra: Map<String, Value>,
}

/// Outcome of relevance judging for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
	/// The strategy does not judge chunks.
	NotRequested,
	Judged { score: f32, justification: String },
	/// Judging was attempted but produced no score for this chunk.
	Unjudged { reason: String },
}

/// A chunk with its vector similarity score and, on the agent path, its judge evaluation.
/// The two scores are kept side by side and never blended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
	pub chunk: Chunk,
	pub vector_score: f32,
	pub evaluation: Evaluation,
}
impl ScoredChunk {
	pub fn new(chunk: Chunk, vector_score: f32) -> Self {
		Self { chunk, vector_score, evaluation: Evaluation::NotRequested }
	}

	pub fn judge_score(&self) -> Option<f32> {
		match &self.evaluation {
			Evaluation::Judged { score, .. } => Some(*score),
			_ => None,
		}
	}

	pub fn justification(&self) -> Option<&str> {
		match &self.evaluation {
			Evaluation::Judged { justification, .. } => Some(justification),
			_ => None,
		}
	}

	pub fn is_unjudged(&self) -> bool {
		matches!(self.evaluation, Evaluation::Unjudged { .. })
	}

	/// Score that orders this chunk: the judge score when present, else the vector score.
	pub fn effective_score(&self) -> f32 {
		self.judge_score().unwrap_or(self.vector_score)
	}

	pub fn date(&self) -> Date {
		self.chunk.metadata.date
	}
}

/// Result ordering: judged chunks before unjudged ones, then descending effective score,
/// descending vector score, earliest date, and finally chunk id.
pub fn cmp_ranked(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
	a.is_unjudged()
		.cmp(&b.is_unjudged())
		.then_with(|| cmp_f32_desc(a.effective_score(), b.effective_score()))
		.then_with(|| cmp_f32_desc(a.vector_score, b.vector_score))
		.then_with(|| a.date().cmp(&b.date()))
		.then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

pub fn sort_ranked(chunks: &mut [ScoredChunk]) {
	chunks.sort_by(cmp_ranked);
}

pub fn is_ranked(chunks: &[ScoredChunk]) -> bool {
	chunks.windows(2).all(|pair| cmp_ranked(&pair[0], &pair[1]) != Ordering::Greater)
}

/// Descending order with NaN last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
