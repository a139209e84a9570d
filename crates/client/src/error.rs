/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    ///
    /// During polling this is treated as transient: the tick is skipped
    /// and the loop continues.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// An authenticated request was rejected (401/403). Propagated to the
    /// surrounding session layer, never handled here.
    #[error("Authentication expired")]
    AuthExpired,
}

impl ApiError {
    /// Whether retrying on the next polling tick is reasonable.
    ///
    /// Transport failures and server-side 5xx responses are transient;
    /// everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Request(_) => true,
            ApiError::Api { status, .. } => *status >= 500,
            ApiError::AuthExpired => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = ApiError::Api {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let err = ApiError::Api {
            status: 404,
            body: "not found".to_string(),
        };
        assert!(!err.is_transient());
        assert!(!ApiError::AuthExpired.is_transient());
    }
}
