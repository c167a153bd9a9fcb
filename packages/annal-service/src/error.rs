pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Service unavailable: {message}")]
	Unavailable { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Request cancelled: {message}")]
	Cancelled { message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}
}

impl From<annal_domain::Error> for Error {
	fn from(err: annal_domain::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<annal_storage::Error> for Error {
	fn from(err: annal_storage::Error) -> Self {
		if err.is_unavailable() {
			return Self::Unavailable { message: err.to_string() };
		}

		match err {
			annal_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			annal_storage::Error::Qdrant(inner) => Self::Storage { message: inner.to_string() },
		}
	}
}

impl From<annal_providers::Error> for Error {
	fn from(err: annal_providers::Error) -> Self {
		match err {
			annal_providers::Error::Reqwest(inner) if inner.is_connect() || inner.is_timeout() =>
				Self::Unavailable { message: inner.to_string() },
			other => Self::Provider { message: other.to_string() },
		}
	}
}
