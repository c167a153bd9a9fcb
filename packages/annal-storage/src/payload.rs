//! Decoding of Qdrant points into archive chunks.

use std::collections::HashMap;

use qdrant_client::qdrant::{PointId, ScoredPoint, Value, point_id::PointIdOptions, value::Kind};
use serde_json::{Map, Number};
use time::{Date, Month};

use annal_config::PayloadFields;
use annal_domain::{Chunk, ChunkMetadata, ScoredChunk, date_serde};

/// Why a point could not become a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	MissingId,
	MissingText,
	MissingDate,
}
impl DecodeError {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::MissingId => "missing point id",
			Self::MissingText => "missing text field",
			Self::MissingDate => "missing or unparseable date",
		}
	}
}

pub fn decode_point(
	point: &ScoredPoint,
	fields: &PayloadFields,
) -> Result<ScoredChunk, DecodeError> {
	let id = point.id.as_ref().and_then(point_id_string).ok_or(DecodeError::MissingId)?;
	let payload = &point.payload;
	let text = payload_str(payload, &fields.text).ok_or(DecodeError::MissingText)?;
	let date = payload_date(payload, fields).ok_or(DecodeError::MissingDate)?;
	let known = [&fields.text, &fields.title, &fields.date, &fields.url];
	let mut extra = Map::new();

	for (key, value) in payload {
		if known.contains(&key) {
			continue;
		}

		extra.insert(key.clone(), to_json(value));
	}

	let chunk = Chunk {
		id,
		text: text.to_string(),
		metadata: ChunkMetadata {
			title: payload_str(payload, &fields.title).unwrap_or_default().to_string(),
			date,
			url: payload_str(payload, &fields.url).filter(|url| !url.is_empty()).map(str::to_string),
			window: None,
			keyword_hits: Vec::new(),
			extra,
		},
	};

	Ok(ScoredChunk::new(chunk, point.score))
}

pub fn point_id_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		None => None,
	}
}

/// The date field when it parses, else January 1st of the year field.
fn payload_date(payload: &HashMap<String, Value>, fields: &PayloadFields) -> Option<Date> {
	if let Some(date) = payload_str(payload, &fields.date).and_then(date_serde::parse_archive_date)
	{
		return Some(date);
	}

	let year = payload_i32(payload, &fields.year)?;

	Date::from_calendar_date(year, Month::January, 1).ok()
}

fn payload_str<'a>(payload: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.as_str()),
		_ => None,
	}
}

fn payload_i32(payload: &HashMap<String, Value>, key: &str) -> Option<i32> {
	match &payload.get(key)?.kind {
		Some(Kind::IntegerValue(value)) => i32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				i32::try_from(*value as i64).ok()
			} else {
				None
			},
		Some(Kind::StringValue(text)) => text.trim().parse().ok(),
		_ => None,
	}
}

fn to_json(value: &Value) -> serde_json::Value {
	match &value.kind {
		None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
		Some(Kind::BoolValue(flag)) => serde_json::Value::Bool(*flag),
		Some(Kind::IntegerValue(number)) => serde_json::Value::from(*number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(*number).map(serde_json::Value::Number).unwrap_or_default(),
		Some(Kind::StringValue(text)) => serde_json::Value::String(text.clone()),
		Some(Kind::ListValue(list)) =>
			serde_json::Value::Array(list.values.iter().map(to_json).collect()),
		Some(Kind::StructValue(object)) => serde_json::Value::Object(
			object.fields.iter().map(|(key, value)| (key.clone(), to_json(value))).collect(),
		),
	}
}
