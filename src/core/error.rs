//! Failure taxonomy for refresh cycles

use std::error::Error as StdError;
use std::fmt::{self, Display};
use thiserror::Error;

/// Errors that abort a single refresh cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Configuration could not be loaded at startup
    #[error("Failed to load configuration")]
    ConfigLoad(#[source] anyhow::Error),

    /// Price or ledger API could not be reached
    #[error("Request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response did not match the expected shape
    #[error("Unexpected response from {url}: {reason}")]
    Protocol { url: String, reason: String },
}

impl FetchError {
    pub fn protocol(url: &str, reason: impl Into<String>) -> Self {
        FetchError::Protocol {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::ConfigLoad(_) => FailureKind::ConfigLoad,
            FetchError::Transport { .. } => FailureKind::Transport,
            FetchError::Protocol { .. } => FailureKind::Protocol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConfigLoad,
    Transport,
    Protocol,
    /// The cycle was dropped by shutdown before it reported a result.
    Abandoned,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FailureKind::ConfigLoad => "configuration error",
                FailureKind::Transport => "network error",
                FailureKind::Protocol => "protocol error",
                FailureKind::Abandoned => "refresh abandoned",
            }
        )
    }
}

/// Captured failure of one cycle. Cloneable so every consumer of the cycle
/// sees the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Every error in the `source()` chain below `message`, outermost first.
    pub trace: Vec<String>,
}

impl FetchFailure {
    pub fn abandoned() -> Self {
        FetchFailure {
            kind: FailureKind::Abandoned,
            message: "Refresh cycle was abandoned before completing".to_string(),
            trace: Vec::new(),
        }
    }
}

impl From<FetchError> for FetchFailure {
    fn from(err: FetchError) -> Self {
        let mut trace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push(cause.to_string());
            source = cause.source();
        }

        FetchFailure {
            kind: err.kind(),
            message: err.to_string(),
            trace,
        }
    }
}

impl Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        for cause in &self.trace {
            write!(f, "\n  caused by: {cause}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_failure_keeps_full_cause_trace() {
        let load_err = std::fs::read_to_string("/nonexistent/networth.yaml")
            .context("Failed to read config file: /nonexistent/networth.yaml")
            .unwrap_err();

        let failure = FetchFailure::from(FetchError::ConfigLoad(load_err));

        assert_eq!(failure.kind, FailureKind::ConfigLoad);
        assert_eq!(failure.message, "Failed to load configuration");
        assert_eq!(failure.trace.len(), 2);
        assert_eq!(
            failure.trace[0],
            "Failed to read config file: /nonexistent/networth.yaml"
        );

        let rendered = failure.to_string();
        assert!(rendered.starts_with("configuration error: Failed to load configuration"));
        assert!(rendered.contains("caused by: Failed to read config file"));
    }

    #[test]
    fn test_protocol_error_has_no_trace() {
        let failure = FetchFailure::from(FetchError::protocol(
            "http://localhost/v1/ticker/bitcoin/",
            "expected exactly one ticker entry, got 2",
        ));

        assert_eq!(failure.kind, FailureKind::Protocol);
        assert_eq!(
            failure.message,
            "Unexpected response from http://localhost/v1/ticker/bitcoin/: expected exactly one ticker entry, got 2"
        );
        assert!(failure.trace.is_empty());
    }
}
