use serde_json::json;

use annal_service::{AnalysisChunk, AnalysisRequest, Error};
use annal_testkit::fakes::{MemoryVectorStore, ScriptedGenerator};

use super::{config, harness};

fn excerpt(content: &str, title: &str, date: &str) -> AnalysisChunk {
	let serde_json::Value::Object(metadata) = json!({ "title": title, "date": date }) else {
		unreachable!()
	};

	AnalysisChunk { content: content.to_string(), metadata }
}

fn question() -> AnalysisRequest {
	AnalysisRequest {
		question: "Wie berichtete die Zeitung über den Mauerbau?".to_string(),
		chunks: vec![
			excerpt("Die Mauer teilt Berlin.", "Mauerbau in Berlin", "1961-08-13"),
			excerpt("Die Grenze ist geschlossen.", "Grenze geschlossen", "1961-08-14"),
		],
		model: None,
		system_prompt: None,
		template: None,
		temperature: None,
	}
}

#[tokio::test]
async fn answers_from_the_given_excerpts() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(Vec::new()),
		ScriptedGenerator::replying("Sachlich und ausführlich."),
	);
	let response = harness.service.analyze(question()).await.expect("Analysis must succeed.");

	assert_eq!(response.answer, "Sachlich und ausführlich.");
	assert_eq!(response.metadata.model_used, "hu-llm3");
	assert_eq!(response.metadata.chunks_analyzed_count, 2);

	let calls = harness.generator.calls();

	assert_eq!(calls.len(), 1);
	assert!(
		calls[0]
			.prompt
			.starts_with("Wie berichtete die Zeitung über den Mauerbau?\n\nTextauszüge:\n")
	);
	assert!(calls[0].prompt.contains("[2] Grenze geschlossen (1961-08-14)\n"));
	assert_eq!(calls[0].system_prompt, config().prompts.answer);
	assert_eq!(calls[0].temperature, 0.3);
	assert!(harness.store.calls().is_empty());
}

#[tokio::test]
async fn templates_and_explicit_prompts_select_the_system_prompt() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(Vec::new()),
		ScriptedGenerator::replying("Zusammenfassung."),
	);

	harness
		.service
		.analyze(AnalysisRequest { template: Some("summary".to_string()), ..question() })
		.await
		.expect("Analysis must succeed.");
	harness
		.service
		.analyze(AnalysisRequest {
			template: Some("summary".to_string()),
			system_prompt: Some("Antworte in einem Satz.".to_string()),
			model: Some("anthropic-claude".to_string()),
			..question()
		})
		.await
		.expect("Analysis must succeed.");

	let calls = harness.generator.calls();

	assert_eq!(calls[0].system_prompt, config().prompts.templates["summary"]);
	assert_eq!(calls[1].system_prompt, "Antworte in einem Satz.");
}

#[tokio::test]
async fn default_template_is_the_answer_prompt() {
	let harness =
		harness(config(), MemoryVectorStore::new(Vec::new()), ScriptedGenerator::replying("x"));
	let request: AnalysisRequest = serde_json::from_value(json!({
		"user_prompt": "Was geschah 1961?",
		"chunks_to_analyze": [
			{ "content": "Die Mauer teilt Berlin.", "metadata": { "title": "Mauerbau", "date": "1961-08-13" } }
		],
		"system_prompt_template": "default"
	}))
	.expect("Legacy analysis request must deserialize.");

	assert_eq!(request.template.as_deref(), Some("default"));

	harness.service.analyze(request).await.expect("Analysis must succeed.");

	assert_eq!(harness.generator.calls()[0].system_prompt, config().prompts.answer);
}

#[tokio::test]
async fn invalid_requests_never_reach_the_model() {
	let harness =
		harness(config(), MemoryVectorStore::new(Vec::new()), ScriptedGenerator::replying("x"));
	let requests = [
		AnalysisRequest { chunks: Vec::new(), ..question() },
		AnalysisRequest { question: " ".to_string(), ..question() },
		AnalysisRequest { chunks: vec![excerpt("  ", "Leer", "1961-01-01")], ..question() },
		AnalysisRequest { model: Some("unknown".to_string()), ..question() },
		AnalysisRequest { template: Some("unknown".to_string()), ..question() },
		AnalysisRequest { temperature: Some(-0.1), ..question() },
	];

	for request in requests {
		let err = harness.service.analyze(request).await.expect_err("Request must be rejected.");

		assert!(matches!(err, Error::InvalidRequest { .. }), "unexpected error: {err:?}");
	}

	assert_eq!(harness.generator.call_count(), 0);
}

#[tokio::test]
async fn model_failures_are_provider_errors() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(Vec::new()),
		ScriptedGenerator::failing("context window exceeded"),
	);
	let err = harness.service.analyze(question()).await.expect_err("Analysis must fail.");

	assert!(matches!(err, Error::Provider { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn public_config_lists_models_and_templates() {
	let harness =
		harness(config(), MemoryVectorStore::new(Vec::new()), ScriptedGenerator::replying("x"));
	let public = harness.service.public_config();

	assert_eq!(
		public.models.iter().map(|m| (m.id.as_str(), m.display_name.as_str())).collect::<Vec<_>>(),
		vec![("hu-llm3", "HU-LLM 3"), ("anthropic-claude", "Claude")]
	);
	assert_eq!(public.chunk_sizes, vec![500, 2000, 3000]);
	assert_eq!((public.min_year, public.max_year), (1948, 1979));
	assert_eq!(public.prompt_templates, vec!["answer", "judge", "summary"]);
	assert!(public.keyword_expansion);
}
