//! In-memory collaborators for exercising the service without external services.

use std::{
	collections::HashMap,
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::json;

use annal_config::{EmbeddingProviderConfig, LexiconProviderConfig, LlmProviderConfig};
use annal_domain::{ScoredChunk, chunk};
use annal_providers::{
	generation::{Generation, GenerationRequest, Usage},
	lexicon::SimilarWord,
};
use annal_service::{
	BoxFuture, EmbeddingProvider, GenerationProvider, LexiconProvider, SimilarityQuery,
	VectorStore, gateway,
};

/// Vector store over a fixed set of scored chunks.
///
/// Applies the year range, minimum score and enforced keywords of each query, returns matches by
/// descending score (stable for ties) and records every query.
pub struct MemoryVectorStore {
	chunks: Vec<ScoredChunk>,
	delays: Vec<(i32, Duration)>,
	failure: Option<String>,
	respect_years: bool,
	respect_min_score: bool,
	calls: Mutex<Vec<SimilarityQuery>>,
}
impl MemoryVectorStore {
	pub fn new(chunks: Vec<ScoredChunk>) -> Self {
		Self {
			chunks,
			delays: Vec::new(),
			failure: None,
			respect_years: true,
			respect_min_score: true,
			calls: Mutex::new(Vec::new()),
		}
	}

	/// Delays every query whose year range covers `year`.
	pub fn delay_year(mut self, year: i32, delay: Duration) -> Self {
		self.delays.push((year, delay));

		self
	}

	pub fn failing(mut self, message: &str) -> Self {
		self.failure = Some(message.to_string());

		self
	}

	/// Returns chunks regardless of the query's year range.
	pub fn ignoring_year_filter(mut self) -> Self {
		self.respect_years = false;

		self
	}

	/// Returns chunks regardless of the query's minimum score.
	pub fn ignoring_min_score(mut self) -> Self {
		self.respect_min_score = false;

		self
	}

	pub fn calls(&self) -> Vec<SimilarityQuery> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	async fn search(&self, query: &SimilarityQuery) -> annal_service::Result<Vec<ScoredChunk>> {
		{
			let mut calls = self.calls.lock().unwrap_or_else(|err| err.into_inner());

			calls.push(query.clone());
		}

		if let Some(delay) = self.delay_for(query) {
			tokio::time::sleep(delay).await;
		}
		if let Some(message) = &self.failure {
			return Err(annal_service::Error::Storage { message: message.clone() });
		}

		let enforced = query.keywords.as_ref().filter(|_| query.enforce_keywords);
		let mut found = self
			.chunks
			.iter()
			.filter(|scored| {
				!self.respect_years
					|| query.year_range.is_none_or(|range| range.contains(scored.date()))
			})
			.filter(|scored| {
				!self.respect_min_score
					|| query.min_score.is_none_or(|min| scored.vector_score >= min)
			})
			.filter(|scored| enforced.is_none_or(|expr| expr.matches(&scored.chunk.text)))
			.cloned()
			.collect::<Vec<_>>();

		found.sort_by(|a, b| chunk::cmp_f32_desc(a.vector_score, b.vector_score));
		found.truncate(query.limit as usize);

		if !query.enforce_keywords {
			gateway::annotate_keyword_hits(&mut found, query.keywords.as_ref());
		}

		Ok(found)
	}

	fn delay_for(&self, query: &SimilarityQuery) -> Option<Duration> {
		let range = query.year_range?;

		self.delays
			.iter()
			.filter(|(year, _)| range.contains_year(*year))
			.map(|(_, delay)| *delay)
			.max()
	}
}
impl VectorStore for MemoryVectorStore {
	fn similarity_search<'a>(
		&'a self,
		query: &'a SimilarityQuery,
	) -> BoxFuture<'a, annal_service::Result<Vec<ScoredChunk>>> {
		Box::pin(self.search(query))
	}
}

type Script = dyn Fn(&GenerationRequest) -> annal_providers::Result<String> + Send + Sync;

/// Generation provider answering from a closure. Tracks calls and peak concurrency.
pub struct ScriptedGenerator {
	script: Box<Script>,
	delay: Option<Duration>,
	calls: Mutex<Vec<GenerationRequest>>,
	in_flight: AtomicUsize,
	peak: AtomicUsize,
}
impl ScriptedGenerator {
	pub fn new(
		script: impl Fn(&GenerationRequest) -> annal_providers::Result<String> + Send + Sync + 'static,
	) -> Self {
		Self {
			script: Box::new(script),
			delay: None,
			calls: Mutex::new(Vec::new()),
			in_flight: AtomicUsize::new(0),
			peak: AtomicUsize::new(0),
		}
	}

	pub fn replying(text: &str) -> Self {
		let text = text.to_string();

		Self::new(move |_| Ok(text.clone()))
	}

	pub fn failing(message: &str) -> Self {
		let message = message.to_string();

		Self::new(move |_| {
			Err(annal_providers::Error::InvalidResponse { message: message.clone() })
		})
	}

	/// Acts as a relevance judge: scores every numbered candidate whose title `score` rates and
	/// leaves the others out of the reply.
	pub fn judging(score: impl Fn(&str) -> Option<f32> + Send + Sync + 'static) -> Self {
		Self::new(move |request| Ok(judge_reply(&request.prompt, &score)))
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn calls(&self) -> Vec<GenerationRequest> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	/// Highest number of calls observed in flight at once.
	pub fn peak_concurrency(&self) -> usize {
		self.peak.load(Ordering::SeqCst)
	}

	async fn run(
		&self,
		cfg: &LlmProviderConfig,
		request: &GenerationRequest,
	) -> annal_providers::Result<Generation> {
		{
			let mut calls = self.calls.lock().unwrap_or_else(|err| err.into_inner());

			calls.push(request.clone());
		}

		let _guard = InFlight::enter(&self.in_flight, &self.peak);

		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}

		let text = (self.script)(request)?;

		Ok(Generation { text, model: cfg.model.clone(), usage: Usage::default() })
	}
}
impl GenerationProvider for ScriptedGenerator {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a GenerationRequest,
	) -> BoxFuture<'a, annal_providers::Result<Generation>> {
		Box::pin(self.run(cfg, request))
	}
}

struct InFlight<'a>(&'a AtomicUsize);
impl<'a> InFlight<'a> {
	fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
		let now = counter.fetch_add(1, Ordering::SeqCst) + 1;

		peak.fetch_max(now, Ordering::SeqCst);

		Self(counter)
	}
}
impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

/// A fenced judge reply scoring the numbered candidates of `prompt` that `score` rates.
pub fn judge_reply(prompt: &str, score: impl Fn(&str) -> Option<f32>) -> String {
	let evaluations = numbered_titles(prompt)
		.into_iter()
		.filter_map(|(id, title)| {
			score(&title).map(|score| {
				json!({ "id": id, "score": score, "justification": format!("Zu {title}.") })
			})
		})
		.collect::<Vec<_>>();

	format!("```json\n{}\n```", json!({ "evaluations": evaluations }))
}

/// Candidate numbers and titles from `[n] title (date)` prompt lines.
pub fn numbered_titles(prompt: &str) -> Vec<(usize, String)> {
	prompt
		.lines()
		.filter_map(|line| {
			let rest = line.strip_prefix('[')?;
			let (id, rest) = rest.split_once("] ")?;
			let id = id.parse().ok()?;
			let (title, _) = rest.rsplit_once(" (")?;

			Some((id, title.to_string()))
		})
		.collect()
}

/// Lexicon answering from a fixed table. Unknown terms have no neighbours.
#[derive(Default)]
pub struct StaticLexicon {
	words: HashMap<String, Vec<SimilarWord>>,
	calls: Mutex<Vec<(String, u32)>>,
}
impl StaticLexicon {
	pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, Vec<SimilarWord>)>) -> Self {
		Self {
			words: entries.into_iter().map(|(term, words)| (term.to_string(), words)).collect(),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn calls(&self) -> Vec<(String, u32)> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl LexiconProvider for StaticLexicon {
	fn find_similar_words<'a>(
		&'a self,
		_: &'a LexiconProviderConfig,
		term: &'a str,
		top_n: u32,
	) -> BoxFuture<'a, annal_providers::Result<Vec<SimilarWord>>> {
		{
			let mut calls = self.calls.lock().unwrap_or_else(|err| err.into_inner());

			calls.push((term.to_string(), top_n));
		}

		let mut words = self.words.get(term).cloned().unwrap_or_default();

		words.truncate(top_n as usize);

		Box::pin(async move { Ok(words) })
	}
}

/// Embeds every text as a zero vector of the configured size.
pub struct StaticEmbedding;
impl EmbeddingProvider for StaticEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, annal_providers::Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|_| vec![0.0; cfg.dimensions as usize]).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

pub fn similar(word: &str, similarity: f32) -> SimilarWord {
	SimilarWord { word: word.to_string(), similarity, frequency: 0 }
}
