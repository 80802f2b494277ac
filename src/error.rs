/// Fatal failures of an agent run. Exhaustion and cancellation are outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{0} is not set")]
    MissingCredential(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to open {url}")]
    Startup {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Decision service request failed")]
    Transport(#[source] reqwest::Error),

    #[error("Decision service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to decode decision service response")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to capture {what}")]
    Capture {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Browser action '{kind}' failed")]
    Action {
        kind: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Browser task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn error_display() {
        let err = AgentError::MissingCredential("OPENAI_API_KEY");
        assert_eq!(err.to_string(), "OPENAI_API_KEY is not set");

        let err = AgentError::Status {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            body: "slow down".into(),
        };
        assert_eq!(
            err.to_string(),
            "Decision service returned 429 Too Many Requests: slow down"
        );
    }

    #[test]
    fn capture_keeps_cause() {
        let err = AgentError::Capture {
            what: "screenshot",
            source: anyhow::anyhow!("tab crashed"),
        };
        assert_eq!(err.to_string(), "Failed to capture screenshot");
        assert_eq!(err.source().unwrap().to_string(), "tab crashed");
    }
}
