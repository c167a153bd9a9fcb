use std::time::Duration;

use annal_domain::{JudgeOutcome, StrategyKind};
use annal_service::{AgentOptions, Error, RetrievalRequest};
use annal_testkit::fakes::{self, MemoryVectorStore, ScriptedGenerator};

use super::{berlin_archive, berlin_request, config, harness, ids};

fn assisted() -> RetrievalRequest {
	RetrievalRequest {
		use_llm_assistance: true,
		agent: AgentOptions { time_window_size: Some(5), ..AgentOptions::default() },
		..berlin_request()
	}
}

fn score_by_title(title: &str) -> Option<f32> {
	match title {
		"Mauerbau in Berlin" => Some(8.0),
		"Grenze geschlossen" => Some(6.0),
		"Kennedy in Berlin" => Some(9.0),
		"Wetterbericht" => Some(0.0),
		"Passierscheinabkommen" => Some(7.0),
		"Fluchttunnel" => Some(8.5),
		"Mondlandung" => Some(1.0),
		"Viermächteabkommen" => Some(5.0),
		_ => None,
	}
}

#[tokio::test]
async fn judge_scores_order_each_window() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(score_by_title),
	);
	let response = harness.service.retrieve(assisted()).await.expect("Search must succeed.");

	assert_eq!(response.metadata.search.strategy, StrategyKind::TimeWindowAgent);
	assert_eq!(ids(&response), vec!["a3", "a1", "a2", "a4", "b2", "b1", "b3", "c1"]);
	assert!(response.chunks.iter().all(|chunk| chunk.judged == Some(true)));

	let kennedy = &response.chunks[0];

	assert_eq!(kennedy.llm_evaluation_score, Some(9.0));
	assert_eq!(kennedy.vector_similarity_score, Some(0.74));
	assert_eq!(kennedy.relevance_score, 0.74);
	assert_eq!(kennedy.llm_evaluation_text.as_deref(), Some("Zu Kennedy in Berlin."));
	assert_eq!(harness.generator.call_count(), 3);

	let agent = response.metadata.search.agent.as_ref().expect("Agent settings must be echoed.");

	assert_eq!(agent.model, "hu-llm3");
	assert_eq!(agent.chunks_per_window_initial, 50);
}

#[tokio::test]
async fn judge_receives_numbered_candidates_and_the_judge_prompt() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(score_by_title),
	);

	harness.service.retrieve(assisted()).await.expect("Search must succeed.");

	let calls = harness.generator.calls();
	let first = calls
		.iter()
		.find(|call| call.prompt.contains("Mauerbau in Berlin"))
		.expect("The first window must be judged.");

	assert!(first.prompt.starts_with("Suchanfrage: Berliner Mauer\n"));
	assert!(first.prompt.contains("[1] Mauerbau in Berlin (1961-08-13)\n"));
	assert!(first.prompt.contains("[4] Wetterbericht (1962-01-05)\n"));
	assert_eq!(first.system_prompt, config().prompts.judge);
	assert_eq!(first.temperature, 0.1);
}

#[tokio::test]
async fn final_count_limits_each_window() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(score_by_title),
	);
	let mut request = assisted();

	request.agent.chunks_per_window_final = Some(1);

	let response = harness.service.retrieve(request).await.expect("Search must succeed.");

	assert_eq!(ids(&response), vec!["a3", "b2", "c1"]);
}

#[tokio::test]
async fn one_failed_judge_keeps_its_window_unjudged() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::new(|request| {
			if request.prompt.contains("Passierscheinabkommen") {
				return Err(annal_providers::Error::InvalidResponse {
					message: "upstream overloaded".to_string(),
				});
			}

			Ok(fakes::judge_reply(&request.prompt, score_by_title))
		}),
	);
	let response = harness.service.retrieve(assisted()).await.expect("Search must succeed.");
	let windows = &response.metadata.search.windows;

	assert_eq!(ids(&response), vec!["a3", "a1", "a2", "a4", "b1", "b2", "b3", "c1"]);
	assert!(matches!(windows[0].judge, JudgeOutcome::Judged { evaluated: 4, omitted: 0 }));
	assert!(matches!(
		&windows[1].judge,
		JudgeOutcome::Failed { reason } if reason.contains("upstream overloaded")
	));
	assert!(matches!(windows[2].judge, JudgeOutcome::Judged { evaluated: 1, omitted: 0 }));

	for chunk in response.chunks.iter().filter(|chunk| chunk.id.starts_with('b')) {
		assert_eq!(chunk.judged, Some(false));
		assert_eq!(chunk.llm_evaluation_score, None);
		assert!(chunk.vector_similarity_score.is_some());
	}
}

#[tokio::test]
async fn omitted_candidates_are_flagged_individually() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(|title| match title {
			"Grenze geschlossen" => None,
			_ => score_by_title(title),
		}),
	);
	let response = harness.service.retrieve(assisted()).await.expect("Search must succeed.");
	let first_window = &response.chunks[..4];

	assert_eq!(
		first_window.iter().map(|chunk| chunk.id.as_str()).collect::<Vec<_>>(),
		vec!["a3", "a1", "a4", "a2"]
	);
	assert_eq!(first_window[3].judged, Some(false));
	assert_eq!(
		response.metadata.search.windows[0].judge,
		JudgeOutcome::Judged { evaluated: 3, omitted: 1 }
	);
}

#[tokio::test]
async fn unparseable_replies_fail_only_judging() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("Alle Auszüge sind relevant."),
	);
	let response = harness.service.retrieve(assisted()).await.expect("Search must succeed.");

	assert_eq!(ids(&response), vec!["a1", "a2", "a3", "a4", "b1", "b2", "b3", "c1"]);
	assert!(response.chunks.iter().all(|chunk| chunk.judged == Some(false)));
	assert!(
		response
			.metadata
			.search
			.windows
			.iter()
			.all(|w| matches!(w.judge, JudgeOutcome::Failed { .. }))
	);
}

#[tokio::test]
async fn judge_timeouts_leave_chunks_unjudged() {
	let mut cfg = config();

	cfg.agent.judge_timeout_ms = 50;

	let harness = harness(
		cfg,
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(score_by_title).with_delay(Duration::from_secs(2)),
	);
	let response = harness.service.retrieve(assisted()).await.expect("Search must succeed.");

	assert_eq!(response.chunks.len(), 8);
	assert!(response.chunks.iter().all(|chunk| chunk.judged == Some(false)));
}

#[tokio::test]
async fn judge_calls_respect_the_concurrency_gate() {
	let mut cfg = config();

	cfg.agent.judge_concurrency = 1;

	let harness = harness(
		cfg,
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(score_by_title).with_delay(Duration::from_millis(30)),
	);

	harness.service.retrieve(assisted()).await.expect("Search must succeed.");

	assert_eq!(harness.generator.call_count(), 3);
	assert_eq!(harness.generator.peak_concurrency(), 1);
}

#[tokio::test]
async fn empty_windows_skip_the_judge() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(score_by_title),
	);
	let request = RetrievalRequest { year_start: Some(1950), year_end: Some(1959), ..assisted() };
	let response = harness.service.retrieve(request).await.expect("Search must succeed.");

	assert!(response.chunks.is_empty());
	assert_eq!(harness.generator.call_count(), 0);
	assert!(response.metadata.search.windows.iter().all(|w| w.judge == JudgeOutcome::Skipped));
}

#[tokio::test]
async fn unknown_models_are_rejected() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(score_by_title),
	);
	let mut request = assisted();

	request.agent.model = Some("gpt-unknown".to_string());

	let err = harness.service.retrieve(request).await.expect_err("Model must be rejected.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "unexpected error: {err:?}");
	assert!(harness.store.calls().is_empty());
}

#[tokio::test]
async fn chunks_below_the_recall_floor_never_reach_the_judge() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()).ignoring_min_score(),
		ScriptedGenerator::judging(score_by_title),
	);
	let mut request = assisted();

	request.agent.min_retrieval_score = Some(0.5);

	let response = harness.service.retrieve(request).await.expect("Search must succeed.");

	assert_eq!(ids(&response), vec!["a3", "a1", "a2", "b2", "b1", "c1"]);
	assert!(harness.store.calls().iter().all(|call| call.min_score == Some(0.5)));

	for call in harness.generator.calls() {
		assert!(!call.prompt.contains("Wetterbericht"));
		assert!(!call.prompt.contains("Mondlandung"));
	}
}

#[tokio::test]
async fn judged_chunks_lie_inside_their_window() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()).ignoring_year_filter(),
		ScriptedGenerator::judging(score_by_title),
	);
	let response = harness.service.retrieve(assisted()).await.expect("Search must succeed.");

	assert!(!response.chunks.is_empty());
	assert!(!ids(&response).contains(&"z1"));
	assert!(harness.generator.calls().iter().all(|call| !call.prompt.contains("Währungsreform")));

	for chunk in &response.chunks {
		let window = chunk.metadata.window.expect("Agent chunks must carry their window.");

		assert!(window.contains(chunk.metadata.date), "{} outside {window}", chunk.id);
	}
}

#[tokio::test]
async fn llm_assistance_takes_precedence_over_time_intervals() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(score_by_title),
	);
	let request = RetrievalRequest {
		use_time_intervals: true,
		time_window_size: Some(2),
		chunks_per_window: Some(1),
		..assisted()
	};
	let response = harness.service.retrieve(request).await.expect("Search must succeed.");
	let windows = &response.metadata.search.windows;

	assert_eq!(response.metadata.search.strategy, StrategyKind::TimeWindowAgent);
	assert_eq!(
		windows.iter().map(|w| (w.window.range.start(), w.window.range.end())).collect::<Vec<_>>(),
		vec![(1960, 1964), (1965, 1969), (1970, 1970)]
	);
	assert_eq!(response.chunks.len(), 8);
	assert!(harness.store.calls().iter().all(|call| call.limit == 50));
	assert_eq!(harness.generator.call_count(), 3);
}

#[tokio::test]
async fn disabled_time_windows_judge_one_window() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::judging(score_by_title),
	);
	let mut request = assisted();

	request.agent.use_time_windows = Some(false);

	let response = harness.service.retrieve(request).await.expect("Search must succeed.");
	let windows = &response.metadata.search.windows;

	assert_eq!(response.metadata.search.strategy, StrategyKind::TimeWindowAgent);
	assert_eq!(windows.len(), 1);
	assert_eq!((windows[0].window.range.start(), windows[0].window.range.end()), (1960, 1970));
	assert_eq!(response.chunks.len(), 8);
	assert_eq!(harness.store.calls().len(), 1);
	assert_eq!(harness.generator.call_count(), 1);
	assert_eq!(response.chunks[0].id, "a3");
}
