use thiserror::Error;

pub type Result<T> = std::result::Result<T, PushshiftError>;

#[derive(Debug, Error)]
pub enum PushshiftError {
    /// The search endpoint could not be reached.
    #[error("Pushshift unreachable: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status (rate limit, outage).
    #[error("Pushshift search answered status {status}: {message}")]
    Api { status: u16, message: String },

    /// The body was not the `{"data": [...]}` envelope.
    #[error("Malformed search response: {0}")]
    Parse(String),
}

impl PushshiftError {
    /// HTTP status of the failed call, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            PushshiftError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PushshiftError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return PushshiftError::Parse(err.to_string());
        }
        PushshiftError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PushshiftError {
    fn from(err: serde_json::Error) -> Self {
        PushshiftError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_api_errors_carry_a_status() {
        let api = PushshiftError::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(api.status(), Some(429));
        assert!(api.to_string().contains("429"));
        assert_eq!(PushshiftError::Network("reset".to_string()).status(), None);
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        let err: PushshiftError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, PushshiftError::Parse(_)));
        assert_eq!(err.status(), None);
    }
}
