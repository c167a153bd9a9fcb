use std::{sync::Arc, time::Duration};

use annal_domain::{StrategyKind, YearRange, chunk};
use annal_service::{AnnalService, Error, QdrantGateway, RetrievalRequest};
use annal_storage::QdrantStore;
use annal_testkit::{
	fakes::{MemoryVectorStore, ScriptedGenerator, StaticEmbedding, StaticLexicon},
	fixtures,
};

use super::{RecordedProgress, berlin_archive, berlin_request, config, harness, ids};

#[tokio::test]
async fn returns_in_range_chunks_by_descending_similarity() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
	);
	let response = harness.service.retrieve(berlin_request()).await.expect("Search must succeed.");

	assert_eq!(ids(&response), vec!["a1", "a2", "a3", "b1", "b2", "c1", "b3", "a4"]);
	assert!(response.chunks.windows(2).all(|pair| pair[0].relevance_score >= pair[1].relevance_score));
	assert!(response.chunks.iter().all(|chunk| chunk.judged.is_none()));
	assert_eq!(response.metadata.search.strategy, StrategyKind::Standard);
	assert_eq!(response.metadata.search.year_range, YearRange::new(1960, 1970).unwrap());
	assert_eq!(response.metadata.total_chunks_found, 8);
	assert_eq!(harness.generator.call_count(), 0);

	let calls = harness.store.calls();

	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].limit, 10);
	assert_eq!(calls[0].chunk_size, 3000);
	assert_eq!(calls[0].min_score, Some(0.3));
}

#[tokio::test]
async fn repeated_searches_return_the_same_chunks() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
	);
	let first = harness.service.retrieve(berlin_request()).await.expect("Search must succeed.");
	let second = harness.service.retrieve(berlin_request()).await.expect("Search must succeed.");

	assert_eq!(first.chunks, second.chunks);
	assert_ne!(first.request_id, second.request_id);
}

#[tokio::test]
async fn top_k_and_min_score_limit_the_result() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
	);
	let request =
		RetrievalRequest { top_k: Some(2), min_relevance_score: Some(0.5), ..berlin_request() };
	let response = harness.service.retrieve(request).await.expect("Search must succeed.");

	assert_eq!(ids(&response), vec!["a1", "a2"]);
}

#[tokio::test]
async fn empty_archive_is_a_successful_empty_result() {
	let harness =
		harness(config(), MemoryVectorStore::new(Vec::new()), ScriptedGenerator::replying("unused"));
	let response = harness.service.retrieve(berlin_request()).await.expect("Search must succeed.");

	assert!(response.chunks.is_empty());
	assert_eq!(response.metadata.total_chunks_found, 0);
}

#[tokio::test]
async fn enforced_keywords_filter_chunks() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
	);
	let request =
		RetrievalRequest { keywords: Some("mauer AND berlin".to_string()), ..berlin_request() };
	let response = harness.service.retrieve(request).await.expect("Search must succeed.");

	assert_eq!(ids(&response), vec!["a1", "a3", "b1"]);
	assert!(response.metadata.search.enforce_keywords);
}

#[tokio::test]
async fn advisory_keywords_annotate_without_reordering() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
	);
	let plain = harness.service.retrieve(berlin_request()).await.expect("Search must succeed.");
	let request = RetrievalRequest {
		keywords: Some("mauer AND berlin".to_string()),
		enforce_keywords: Some(false),
		..berlin_request()
	};
	let advisory = harness.service.retrieve(request).await.expect("Search must succeed.");

	assert_eq!(ids(&plain), ids(&advisory));
	assert_eq!(advisory.chunks[0].metadata.keyword_hits, vec!["mauer", "berlin"]);
	assert!(advisory.chunks.iter().find(|c| c.id == "b3").unwrap().metadata.keyword_hits.is_empty());
}

#[tokio::test]
async fn out_of_range_chunks_from_the_store_are_dropped() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()).ignoring_year_filter(),
		ScriptedGenerator::replying("unused"),
	);
	let response = harness.service.retrieve(berlin_request()).await.expect("Search must succeed.");
	let range = YearRange::new(1960, 1970).unwrap();

	assert!(!ids(&response).contains(&"z1"));
	assert!(response.chunks.iter().all(|chunk| range.contains(chunk.metadata.date)));
}

#[tokio::test]
async fn reports_start_and_finish_progress() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
	);
	let progress = RecordedProgress::default();

	harness
		.service
		.retrieve_with_progress(berlin_request(), &progress)
		.await
		.expect("Search must succeed.");

	let events = progress.events();

	assert_eq!(events.len(), 2);
	assert_eq!(events[0].0, 0.0);
	assert_eq!(events[1].0, 1.0);
}

#[tokio::test]
async fn vector_store_timeout_is_unavailable() {
	let mut cfg = config();

	cfg.search.gateway_timeout_ms = 50;

	let harness = harness(
		cfg,
		MemoryVectorStore::new(berlin_archive()).delay_year(1965, Duration::from_secs(2)),
		ScriptedGenerator::replying("unused"),
	);
	let err = harness.service.retrieve(berlin_request()).await.expect_err("Search must time out.");

	assert!(matches!(err, Error::Unavailable { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn vector_store_errors_surface_unchanged() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()).failing("collection missing"),
		ScriptedGenerator::replying("unused"),
	);
	let err = harness.service.retrieve(berlin_request()).await.expect_err("Search must fail.");

	assert!(
		matches!(&err, Error::Storage { message } if message == "collection missing"),
		"unexpected error: {err:?}"
	);
}

#[tokio::test]
async fn unreachable_qdrant_is_unavailable() {
	let mut cfg = config();

	cfg.storage.qdrant.url = "http://127.0.0.1:1".to_string();

	let qdrant = QdrantStore::new(&cfg.storage.qdrant).expect("Failed to build Qdrant client.");
	let store = QdrantGateway::new(qdrant, cfg.providers.embedding.clone(), Arc::new(StaticEmbedding));
	let providers = fixtures::providers(
		Arc::new(ScriptedGenerator::replying("unused")),
		Arc::new(StaticLexicon::default()),
	);
	let service = AnnalService::with_collaborators(cfg, Arc::new(store), providers);
	let err = service.retrieve(berlin_request()).await.expect_err("Search must fail.");

	assert!(matches!(err, Error::Unavailable { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn request_timeout_cancels_the_search() {
	let mut cfg = config();

	cfg.search.request_timeout_ms = 50;

	let harness = harness(
		cfg,
		MemoryVectorStore::new(berlin_archive()).delay_year(1960, Duration::from_secs(2)),
		ScriptedGenerator::replying("unused"),
	);
	let err = harness.service.retrieve(berlin_request()).await.expect_err("Search must time out.");

	assert!(matches!(err, Error::Cancelled { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn strategy_results_are_ranked() {
	let harness = harness(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
	);
	let plan = annal_service::request::plan(&harness.service.cfg, &berlin_request())
		.expect("Request must be valid.");
	let ctx = harness.service.strategy_context(None);
	let result = plan
		.strategy
		.run(&ctx, &plan.config, &annal_service::NoProgress)
		.await
		.expect("Search must succeed.");

	assert!(chunk::is_ranked(&result.chunks));
}
