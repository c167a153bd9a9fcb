use serde::{Deserialize, Deserializer, Serializer};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn serialize<S>(value: &Date, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = value.format(ISO_DATE).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	parse_archive_date(&raw)
		.ok_or_else(|| serde::de::Error::custom(format!("unrecognised date {raw:?}")))
}

/// Parses the date formats found in archive payloads: `YYYY-MM-DD` (optionally followed by a
/// time part), `DD.MM.YYYY`, `YYYY-MM` and a bare `YYYY`. Partial dates resolve to the first
/// day of the period.
pub fn parse_archive_date(raw: &str) -> Option<Date> {
	let raw = raw.trim();
	let head = raw.split(['T', ' ']).next().unwrap_or(raw);

	if let Ok(date) = Date::parse(head, ISO_DATE) {
		return Some(date);
	}
	if let Ok(date) = Date::parse(head, format_description!("[day].[month].[year]")) {
		return Some(date);
	}

	let mut parts = head.splitn(2, '-');
	let year = parts.next()?.parse::<i32>().ok()?;
	let month = match parts.next() {
		Some(month) => month.parse::<u8>().ok()?,
		None => 1,
	};

	Date::from_calendar_date(year, month.try_into().ok()?, 1).ok()
}

pub mod option {
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Date;

	pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(date) => super::serialize(date, serializer),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Option::<String>::deserialize(deserializer)?;

		raw.map(|raw| {
			super::parse_archive_date(&raw)
				.ok_or_else(|| serde::de::Error::custom(format!("unrecognised date {raw:?}")))
		})
		.transpose()
	}
}
