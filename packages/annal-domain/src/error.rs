pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Query must be non-empty.")]
	EmptyQuery,
	#[error("Year range start {start} exceeds end {end}.")]
	InvertedYearRange { start: i32, end: i32 },
	#[error("Window width must be greater than zero.")]
	ZeroWindowWidth,
	#[error("Keyword expression is malformed: {message}")]
	KeywordSyntax { message: String },
}
