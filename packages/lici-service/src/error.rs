pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Embedding failed: {message}")]
	Embedding { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<lici_storage::Error> for Error {
	fn from(err: lici_storage::Error) -> Self {
		match err {
			lici_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			lici_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			lici_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
