use annal_service::{Error, ExpandRequest, RetrievalRequest};
use annal_testkit::fakes::{self, MemoryVectorStore, ScriptedGenerator, StaticLexicon};

use super::{berlin_archive, berlin_request, config, harness, harness_with_lexicon, ids};

fn lexicon() -> StaticLexicon {
	StaticLexicon::new([
		("mauer", vec![fakes::similar("mauerbau", 0.82), fakes::similar("grenzmauer", 0.77)]),
		("berlin", vec![fakes::similar("ostberlin", 0.91), fakes::similar("westberlin", 0.9)]),
	])
}

fn archive_lexicon() -> StaticLexicon {
	StaticLexicon::new([
		(
			"grenze",
			vec![
				fakes::similar("Mauer", 0.8),
				fakes::similar("tunnel", 0.7),
				fakes::similar("zaun", 0.6),
			],
		),
		("mauer", vec![fakes::similar("grenze", 0.8)]),
		("tunnel", vec![fakes::similar("flucht", 0.75)]),
	])
}

fn expanded_search(keywords: &str, expand: bool) -> RetrievalRequest {
	RetrievalRequest {
		keywords: Some(keywords.to_string()),
		enforce_keywords: Some(true),
		use_semantic_expansion: expand,
		..berlin_request()
	}
}

fn expand(expression: &str, top_n: u32) -> ExpandRequest {
	ExpandRequest { expression: expression.to_string(), top_n }
}

#[tokio::test]
async fn expands_each_distinct_term_once() {
	let harness = harness_with_lexicon(
		config(),
		MemoryVectorStore::new(Vec::new()),
		ScriptedGenerator::replying("unused"),
		lexicon(),
	);
	let expansion = harness
		.service
		.expand_keywords(expand("Mauer AND berlin OR NOT mauer", 5))
		.await
		.expect("Expansion must succeed.");

	assert_eq!(expansion.keys().map(String::as_str).collect::<Vec<_>>(), vec!["berlin", "mauer"]);
	assert_eq!(expansion["mauer"][0].word, "mauerbau");
	assert_eq!(harness.lexicon.calls(), vec![("mauer".to_string(), 5), ("berlin".to_string(), 5)]);
}

#[tokio::test]
async fn top_n_bounds_the_neighbours() {
	let harness = harness_with_lexicon(
		config(),
		MemoryVectorStore::new(Vec::new()),
		ScriptedGenerator::replying("unused"),
		lexicon(),
	);
	let expansion = harness
		.service
		.expand_keywords(expand("berlin", 1))
		.await
		.expect("Expansion must succeed.");

	assert_eq!(expansion["berlin"].len(), 1);

	let err = harness
		.service
		.expand_keywords(expand("berlin", 0))
		.await
		.expect_err("Zero neighbours must be rejected.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn operator_only_expressions_expand_to_nothing() {
	let harness = harness_with_lexicon(
		config(),
		MemoryVectorStore::new(Vec::new()),
		ScriptedGenerator::replying("unused"),
		lexicon(),
	);
	let expansion = harness
		.service
		.expand_keywords(expand("AND or NOT", 5))
		.await
		.expect("Expansion must succeed.");

	assert!(expansion.is_empty());
	assert!(harness.lexicon.calls().is_empty());
}

#[tokio::test]
async fn missing_lexicon_service_is_unavailable() {
	let mut cfg = config();

	cfg.providers.lexicon = None;

	let harness =
		harness(cfg, MemoryVectorStore::new(Vec::new()), ScriptedGenerator::replying("unused"));
	let err = harness
		.service
		.expand_keywords(expand("mauer", 5))
		.await
		.expect_err("Expansion must fail without a lexicon.");

	assert!(matches!(err, Error::Unavailable { .. }), "unexpected error: {err:?}");
	assert!(!harness.service.public_config().keyword_expansion);
}

#[test]
fn factor_is_accepted_as_top_n() {
	let request: ExpandRequest =
		serde_json::from_value(serde_json::json!({ "expression": "mauer", "factor": 3 }))
			.expect("Request must parse.");

	assert_eq!(request.top_n, 3);

	let request: ExpandRequest =
		serde_json::from_value(serde_json::json!({ "expression": "mauer" }))
			.expect("Request must parse.");

	assert_eq!(request.top_n, 5);
}

#[tokio::test]
async fn semantic_expansion_broadens_search_keywords() {
	let harness = harness_with_lexicon(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
		archive_lexicon(),
	);
	let response = harness
		.service
		.retrieve(RetrievalRequest { expansion_top_n: Some(2), ..expanded_search("grenze", true) })
		.await
		.expect("Search must succeed.");

	assert_eq!(ids(&response), vec!["a1", "a2", "a3", "b1", "b2"]);
	assert_eq!(response.metadata.search.keywords.as_deref(), Some("grenze OR mauer OR tunnel"));
	assert_eq!(harness.lexicon.calls(), vec![("grenze".to_string(), 2)]);
}

#[tokio::test]
async fn semantic_expansion_leaves_negated_terms_alone() {
	let harness = harness_with_lexicon(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
		archive_lexicon(),
	);
	let response = harness
		.service
		.retrieve(expanded_search("mauer NOT tunnel", true))
		.await
		.expect("Search must succeed.");

	assert_eq!(ids(&response), vec!["a1", "a2", "a3", "b1"]);
	assert_eq!(
		response.metadata.search.keywords.as_deref(),
		Some("(mauer OR grenze) AND NOT tunnel")
	);
	assert_eq!(harness.lexicon.calls(), vec![("mauer".to_string(), 3)]);
}

#[tokio::test]
async fn keywords_are_not_broadened_unless_asked() {
	let harness = harness_with_lexicon(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
		archive_lexicon(),
	);
	let response = harness
		.service
		.retrieve(expanded_search("grenze", false))
		.await
		.expect("Search must succeed.");

	assert_eq!(ids(&response), vec!["a2"]);
	assert_eq!(response.metadata.search.keywords.as_deref(), Some("grenze"));
	assert!(harness.lexicon.calls().is_empty());
}

#[tokio::test]
async fn semantic_expansion_needs_a_lexicon() {
	let mut cfg = config();

	cfg.providers.lexicon = None;

	let harness =
		harness(cfg, MemoryVectorStore::new(berlin_archive()), ScriptedGenerator::replying("unused"));
	let err = harness
		.service
		.retrieve(expanded_search("grenze", true))
		.await
		.expect_err("Search must fail without a lexicon.");

	assert!(matches!(err, Error::Unavailable { .. }), "unexpected error: {err:?}");
	assert!(harness.store.calls().is_empty());
}

#[tokio::test]
async fn expansion_top_n_is_bounded() {
	let harness = harness_with_lexicon(
		config(),
		MemoryVectorStore::new(berlin_archive()),
		ScriptedGenerator::replying("unused"),
		archive_lexicon(),
	);
	let err = harness
		.service
		.retrieve(RetrievalRequest { expansion_top_n: Some(51), ..expanded_search("grenze", true) })
		.await
		.expect_err("Oversized expansion must be rejected.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "unexpected error: {err:?}");
	assert!(harness.lexicon.calls().is_empty());
}
