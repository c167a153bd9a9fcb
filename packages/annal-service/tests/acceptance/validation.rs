use annal_service::{AgentOptions, Error, RetrievalRequest};
use annal_testkit::fakes::{MemoryVectorStore, ScriptedGenerator};

use super::{berlin_archive, berlin_request, config, harness};

async fn rejection(request: RetrievalRequest) -> String {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
	);
	let err = harness.service.retrieve(request).await.expect_err("Request must be rejected.");

	assert!(harness.store.calls().is_empty(), "rejected requests must not reach the store");

	match err {
		Error::InvalidRequest { message } => message,
		other => panic!("unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn blank_queries_are_rejected() {
	let message =
		rejection(RetrievalRequest { query: "   ".to_string(), ..berlin_request() }).await;

	assert!(message.contains("query"), "{message}");
}

#[tokio::test]
async fn inverted_year_ranges_are_rejected() {
	rejection(RetrievalRequest { year_start: Some(1970), year_end: Some(1960), ..berlin_request() })
		.await;
}

#[tokio::test]
async fn years_outside_the_archive_are_rejected() {
	let message = rejection(RetrievalRequest { year_start: Some(1947), ..berlin_request() }).await;

	assert!(message.contains("year_start"), "{message}");
}

#[tokio::test]
async fn unknown_chunk_sizes_are_rejected() {
	let message = rejection(RetrievalRequest { chunk_size: Some(123), ..berlin_request() }).await;

	assert!(message.contains("chunk_size"), "{message}");
}

#[tokio::test]
async fn malformed_keywords_are_rejected() {
	rejection(RetrievalRequest { keywords: Some("(mauer AND".to_string()), ..berlin_request() })
		.await;
	rejection(RetrievalRequest { keywords: Some("mauer OR".to_string()), ..berlin_request() }).await;
}

#[tokio::test]
async fn deeply_nested_keywords_are_rejected() {
	let keywords = format!("{}mauer{}", "(".repeat(2497), ")".repeat(2497));
	let message = rejection(RetrievalRequest { keywords: Some(keywords), ..berlin_request() }).await;

	assert!(message.contains("nesting"), "{message}");
}

#[tokio::test]
async fn unknown_search_fields_are_rejected() {
	let message = rejection(RetrievalRequest {
		search_fields: Some(vec!["Autor".to_string()]),
		..berlin_request()
	})
	.await;

	assert!(message.contains("Autor"), "{message}");
}

#[tokio::test]
async fn out_of_bounds_counts_are_rejected() {
	rejection(RetrievalRequest { top_k: Some(0), ..berlin_request() }).await;
	rejection(RetrievalRequest {
		use_time_intervals: true,
		time_window_size: Some(0),
		..berlin_request()
	})
	.await;
	rejection(RetrievalRequest {
		use_time_intervals: true,
		chunks_per_window: Some(51),
		..berlin_request()
	})
	.await;
}

#[tokio::test]
async fn out_of_range_temperatures_are_rejected() {
	let message = rejection(RetrievalRequest {
		use_llm_assistance: true,
		agent: AgentOptions { temperature: Some(2.5), ..AgentOptions::default() },
		..berlin_request()
	})
	.await;

	assert!(message.contains("temperature"), "{message}");
}

#[test]
fn legacy_field_names_are_accepted() {
	let request: RetrievalRequest = serde_json::from_value(serde_json::json!({
		"retrieval_query": "Mauerbau",
		"search_in": ["Text", "Artikeltitel"],
		"use_time_intervals": true,
		"time_interval_size": 4,
		"chunks_per_interval": 3
	}))
	.expect("Legacy request must parse.");

	assert_eq!(request.query, "Mauerbau");
	assert_eq!(request.search_fields.as_deref().map(<[String]>::len), Some(2));
	assert_eq!(request.time_window_size, Some(4));
	assert_eq!(request.chunks_per_window, Some(3));
}
