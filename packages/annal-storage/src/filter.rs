use qdrant_client::qdrant::{Condition, Filter, Range};

use annal_config::PayloadFields;
use annal_domain::{KeywordExpr, YearRange};

/// Builds the payload filter for a search: the year range on the year field, and when given, the
/// keyword expression as full-text matches.
///
/// A term matches when any of `search_fields` contains it. With no search fields the passage text
/// field is used. Returns `None` when there is nothing to filter on.
pub fn build_metadata_filter(
	year_range: Option<&YearRange>,
	keywords: Option<&KeywordExpr>,
	search_fields: &[String],
	payload: &PayloadFields,
) -> Option<Filter> {
	let mut must = Vec::new();

	if let Some(range) = year_range {
		must.push(year_condition(&payload.year, range));
	}
	if let Some(expr) = keywords {
		let fallback = [payload.text.clone()];
		let fields = if search_fields.is_empty() { &fallback[..] } else { search_fields };

		must.push(keyword_condition(expr, fields));
	}

	if must.is_empty() { None } else { Some(Filter::all(must)) }
}

fn year_condition(field: &str, range: &YearRange) -> Condition {
	Condition::range(
		field,
		Range {
			gte: Some(f64::from(range.start())),
			lte: Some(f64::from(range.end())),
			..Default::default()
		},
	)
}

fn keyword_condition(expr: &KeywordExpr, fields: &[String]) -> Condition {
	match expr {
		KeywordExpr::Term(term) => match fields {
			[field] => Condition::matches_text(field.as_str(), term.as_str()),
			_ => Condition::from(Filter::any(
				fields.iter().map(|field| Condition::matches_text(field.as_str(), term.as_str())),
			)),
		},
		KeywordExpr::Not(inner) =>
			Condition::from(Filter::must_not([keyword_condition(inner, fields)])),
		KeywordExpr::And(items) =>
			Condition::from(Filter::all(items.iter().map(|item| keyword_condition(item, fields)))),
		KeywordExpr::Or(items) =>
			Condition::from(Filter::any(items.iter().map(|item| keyword_condition(item, fields)))),
	}
}
