use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, Result};

/// Inclusive range of publication years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(i32, i32)", into = "(i32, i32)")]
pub struct YearRange {
	start: i32,
	end: i32,
}
impl YearRange {
	pub fn new(start: i32, end: i32) -> Result<Self> {
		if start > end {
			return Err(Error::InvertedYearRange { start, end });
		}

		Ok(Self { start, end })
	}

	pub fn start(&self) -> i32 {
		self.start
	}

	pub fn end(&self) -> i32 {
		self.end
	}

	/// Number of years covered, both bounds included.
	pub fn span(&self) -> u32 {
		self.end.abs_diff(self.start) + 1
	}

	pub fn contains_year(&self, year: i32) -> bool {
		(self.start..=self.end).contains(&year)
	}

	pub fn contains(&self, date: Date) -> bool {
		self.contains_year(date.year())
	}

	/// Splits the range into consecutive windows of `width` years, earliest first.
	///
	/// Every year of the range lands in exactly one window. The final window is narrower when
	/// the span is not a multiple of `width`.
	pub fn windows(&self, width: u32) -> Result<Vec<YearWindow>> {
		if width == 0 {
			return Err(Error::ZeroWindowWidth);
		}

		let count = self.span().div_ceil(width);
		let mut out = Vec::with_capacity(count as usize);
		let mut start = self.start;

		for index in 0..count {
			let end = start.saturating_add(width as i32 - 1).min(self.end);

			out.push(YearWindow { index: index as usize, range: Self { start, end } });

			start = end + 1;
		}

		Ok(out)
	}

	/// The whole range as a single window.
	pub fn as_window(&self) -> YearWindow {
		YearWindow { index: 0, range: *self }
	}
}
impl TryFrom<(i32, i32)> for YearRange {
	type Error = Error;

	fn try_from((start, end): (i32, i32)) -> Result<Self> {
		Self::new(start, end)
	}
}
impl From<YearRange> for (i32, i32) {
	fn from(range: YearRange) -> Self {
		(range.start, range.end)
	}
}
impl fmt::Display for YearRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.start, self.end)
	}
}

/// One slice of a partitioned year range. `index` is the window's position, earliest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearWindow {
	pub index: usize,
	pub range: YearRange,
}
impl YearWindow {
	pub fn contains(&self, date: Date) -> bool {
		self.range.contains(date)
	}
}
impl fmt::Display for YearWindow {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.range.fmt(f)
	}
}
