use qdrant_client::qdrant::{Filter, Query, QueryPointsBuilder};

use annal_config::PayloadFields;
use annal_domain::ScoredChunk;

use crate::{Error, Result, payload};

/// One nearest-neighbour query against the collection of a chunk size.
#[derive(Debug, Clone)]
pub struct VectorSearch {
	pub chunk_size: u32,
	pub vector: Vec<f32>,
	pub limit: u64,
	pub filter: Option<Filter>,
	pub score_threshold: Option<f32>,
}

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection_prefix: String,
	pub vector_dim: u32,
	pub payload: PayloadFields,
}
impl QdrantStore {
	pub fn new(cfg: &annal_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection_prefix: cfg.collection_prefix.clone(),
			vector_dim: cfg.vector_dim,
			payload: cfg.payload.clone(),
		})
	}

	pub fn collection_for(&self, chunk_size: u32) -> String {
		format!("{}_{chunk_size}", self.collection_prefix)
	}

	/// Runs the query and decodes the hits in the order Qdrant returned them, highest similarity
	/// first. Points that cannot be decoded are skipped.
	pub async fn search(&self, search: VectorSearch) -> Result<Vec<ScoredChunk>> {
		if search.vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, expected {}.",
				search.vector.len(),
				self.vector_dim
			)));
		}

		let collection = self.collection_for(search.chunk_size);
		let mut query = QueryPointsBuilder::new(collection.clone())
			.query(Query::new_nearest(search.vector))
			.limit(search.limit)
			.with_payload(true);

		if let Some(filter) = search.filter {
			query = query.filter(filter);
		}
		if let Some(threshold) = search.score_threshold {
			query = query.score_threshold(threshold);
		}

		let response = self.client.query(query).await?;
		let mut out = Vec::with_capacity(response.result.len());

		for point in &response.result {
			match payload::decode_point(point, &self.payload) {
				Ok(scored) => out.push(scored),
				Err(err) => {
					let point_id = point.id.as_ref().and_then(payload::point_id_string);

					tracing::warn!(
						collection = %collection,
						point_id = ?point_id,
						reason = err.as_str(),
						"Skipping undecodable archive point."
					);
				},
			}
		}

		Ok(out)
	}
}
