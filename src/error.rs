use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{source_name} API Error: {status}")]
    Status { source_name: String, status: u16 },

    #[error("Failed to parse {0} response")]
    Parse(String),

    #[error("No data returned for {0}")]
    NoData(String),

    #[error("{0} not configured")]
    MissingKey(&'static str),
}

#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI disabled via flag")]
    Disabled,

    #[error("{0} not configured")]
    MissingKey(&'static str),

    #[error("AI quota previously exceeded")]
    QuotaExceeded,

    #[error("{model} rate limited (429)")]
    RateLimited { model: String },

    #[error("{model} failed with status {status}: {body}")]
    Status { model: String, status: u16, body: String },

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Invalid JSON from {model}: {reason}")]
    InvalidJson { model: String, reason: String },

    #[error("All {attempts} models failed")]
    AllModelsFailed { attempts: usize },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AiError {
    /// Whether the fallback chain should move on to the next candidate model.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::RateLimited { .. }
                | AiError::Status { .. }
                | AiError::EmptyResponse(_)
                | AiError::InvalidJson { .. }
                | AiError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AiError::RateLimited { model: "m".into() }.is_retryable());
        assert!(AiError::InvalidJson { model: "m".into(), reason: "eof".into() }.is_retryable());
        assert!(!AiError::QuotaExceeded.is_retryable());
        assert!(!AiError::Disabled.is_retryable());
    }

    #[test]
    fn test_status_message() {
        let err = FetchError::Status { source_name: "Treasury".into(), status: 503 };
        assert_eq!(err.to_string(), "Treasury API Error: 503");
    }
}
