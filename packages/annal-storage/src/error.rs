use qdrant_client::QdrantError;
use tonic::Code;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Qdrant(#[from] Box<QdrantError>),
}
impl Error {
	/// True when Qdrant could not be reached or did not answer in time, as opposed to
	/// rejecting the request.
	pub fn is_unavailable(&self) -> bool {
		match self {
			Self::InvalidArgument(_) => false,
			Self::Qdrant(inner) => match inner.as_ref() {
				QdrantError::ResponseError { status } => match status.code() {
					Code::Unavailable | Code::DeadlineExceeded => true,
					// The client reports refused connections as internal errors.
					Code::Internal => status.message().starts_with("Failed to connect"),
					_ => false,
				},
				QdrantError::Io(_) => true,
				_ => false,
			},
		}
	}
}
impl From<QdrantError> for Error {
	fn from(err: QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
