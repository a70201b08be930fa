use thiserror::Error;

/// Errors returned by [`KvStore`](crate::KvStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Errors from the HTTP client, such as connection failures and timeouts.
    #[error("reqwest error: {context}")]
    Reqwest {
        /// The operation that failed.
        context: String,
        /// The underlying client error.
        #[source]
        cause: reqwest::Error,
    },

    /// The store answered with an error status.
    #[error("store responded with {status}: {message}")]
    Server {
        /// The HTTP status code.
        status: u16,
        /// The error message reported by the store.
        message: String,
    },

    /// The store returned a payload that could not be decoded.
    #[error("invalid response: {context}")]
    Decode {
        /// What was being decoded.
        context: String,
        /// The decoding error.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The store cannot be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn reqwest(context: impl Into<String>, cause: reqwest::Error) -> Self {
        Self::Reqwest {
            context: context.into(),
            cause,
        }
    }

    pub(crate) fn decode<E>(context: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Decode {
            context: context.into(),
            cause: Box::new(cause),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T, E = StoreError> = Result<T, E>;
