pub mod fakes;
pub mod fixtures;

mod error;

pub use error::{Error, Result};

use std::{collections::HashSet, env, sync::Mutex, thread, time::Duration};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
		PointStruct, UpsertPointsBuilder, VectorParamsBuilder,
	},
};
use time::Date;
use tokio::{runtime::Builder, time as tokio_time};
use uuid::Uuid;

use annal_config::PayloadFields;

/// A passage to index in a live collection.
#[derive(Debug, Clone)]
pub struct LivePoint {
	pub id: u64,
	pub vector: Vec<f32>,
	pub title: String,
	pub date: Date,
	pub text: String,
}

/// Uniquely prefixed Qdrant collections that are deleted on cleanup or drop.
pub struct TestCollection {
	client: Qdrant,
	qdrant_url: String,
	prefix: String,
	cleaned: bool,
	collections: Mutex<HashSet<String>>,
}
impl TestCollection {
	pub fn new(qdrant_url: &str) -> Result<Self> {
		let client = Qdrant::from_url(qdrant_url)
			.build()
			.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;

		Ok(Self {
			client,
			qdrant_url: qdrant_url.to_string(),
			prefix: format!("annal_test_{}", Uuid::new_v4().simple()),
			cleaned: false,
			collections: Mutex::new(HashSet::new()),
		})
	}

	/// Collection prefix to configure; collections are named `<prefix>_<chunk_size>`.
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Creates the collection for `chunk_size` with full-text indexes on the text and title
	/// fields and an integer index on the year field.
	pub async fn create(
		&self,
		chunk_size: u32,
		vector_dim: u32,
		payload: &PayloadFields,
	) -> Result<String> {
		let name = format!("{}_{chunk_size}", self.prefix);

		{
			let mut tracked = self.collections.lock().unwrap_or_else(|err| err.into_inner());

			tracked.insert(name.clone());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(name.clone())
					.vectors_config(VectorParamsBuilder::new(vector_dim.into(), Distance::Cosine)),
			)
			.await?;

		for (field, field_type) in [
			(&payload.text, FieldType::Text),
			(&payload.title, FieldType::Text),
			(&payload.year, FieldType::Integer),
		] {
			self.client
				.create_field_index(
					CreateFieldIndexCollectionBuilder::new(name.clone(), field.clone(), field_type)
						.wait(true),
				)
				.await?;
		}

		Ok(name)
	}

	pub async fn upsert(
		&self,
		collection: &str,
		payload_fields: &PayloadFields,
		points: Vec<LivePoint>,
	) -> Result<()> {
		let points = points
			.into_iter()
			.map(|point| {
				let mut payload = Payload::new();

				payload.insert(payload_fields.text.clone(), point.text);
				payload.insert(payload_fields.title.clone(), point.title);
				payload.insert(payload_fields.date.clone(), point.date.to_string());
				payload.insert(payload_fields.year.clone(), i64::from(point.date.year()));

				PointStruct::new(point.id, point.vector, payload)
			})
			.collect::<Vec<_>>();

		self.client
			.upsert_points(UpsertPointsBuilder::new(collection.to_string(), points).wait(true))
			.await?;

		Ok(())
	}

	pub async fn cleanup(mut self) -> Result<()> {
		let collections = self.tracked();

		cleanup_collections(&self.qdrant_url, &collections).await?;

		self.cleaned = true;

		Ok(())
	}

	fn tracked(&self) -> Vec<String> {
		self.collections.lock().unwrap_or_else(|err| err.into_inner()).iter().cloned().collect()
	}
}
impl Drop for TestCollection {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let qdrant_url = self.qdrant_url.clone();
		let collections = self.tracked();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test collection cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(cleanup_collections(&qdrant_url, &collections)) {
				eprintln!("Test Qdrant cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("ANNAL_QDRANT_URL").ok()
}

async fn cleanup_collections(qdrant_url: &str, collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let client = Qdrant::from_url(qdrant_url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;
	let max_attempts = 6;
	let mut remaining = collections.iter().cloned().collect::<HashSet<_>>();
	let mut backoff = Duration::from_millis(100);

	for attempt in 1..=max_attempts {
		let existing = tokio_time::timeout(Duration::from_secs(10), client.list_collections())
			.await
			.map_err(|_| Error::Message("Qdrant list_collections timed out.".to_string()))?
			.map_err(|err| Error::Message(format!("Failed to list Qdrant collections: {err}.")))?;
		let existing = existing.collections.into_iter().map(|c| c.name).collect::<HashSet<_>>();

		remaining.retain(|collection| existing.contains(collection));

		if remaining.is_empty() {
			return Ok(());
		}

		for collection in remaining.iter().cloned().collect::<Vec<_>>() {
			let result = tokio_time::timeout(
				Duration::from_secs(10),
				client.delete_collection(collection.clone()),
			)
			.await;

			match result {
				Ok(Ok(_)) => {},
				Ok(Err(err)) =>
					if attempt == max_attempts {
						return Err(Error::Message(format!(
							"Failed to delete Qdrant collection {collection:?}: {err}."
						)));
					},
				Err(_) =>
					if attempt == max_attempts {
						return Err(Error::Message(format!(
							"Timed out deleting Qdrant collection {collection:?}."
						)));
					},
			}
		}

		tokio_time::sleep(backoff).await;

		backoff = backoff.saturating_mul(2).min(Duration::from_secs(2));
	}

	Ok(())
}
