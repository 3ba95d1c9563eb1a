//! Domain-level error taxonomy for next-evals.

use std::path::PathBuf;

/// next-evals domain errors.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("eval not found: {0}")]
    EvalNotFound(String),

    #[error("ambiguous eval identifier {id}: matches {candidates:?}")]
    AmbiguousEval { id: String, candidates: Vec<String> },

    #[error("invalid eval {id}: {reason}")]
    InvalidEval { id: String, reason: String },

    #[error("staging error for {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git error: {0}")]
    GitError(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("monitor error: {0}")]
    Monitor(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for next-evals domain operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_error_display() {
        let err = EvalError::EvalNotFound("003-add-route".to_string());
        assert!(err.to_string().contains("eval not found"));
        assert!(err.to_string().contains("003-add-route"));

        let err = EvalError::GitError("stash failed".to_string());
        assert!(err.to_string().contains("git error"));
    }

    #[test]
    fn test_staging_error_names_path() {
        let err = EvalError::Staging {
            path: PathBuf::from("evals/001/input/page.tsx"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let msg = err.to_string();
        assert!(msg.contains("evals/001/input/page.tsx"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = EvalError::DigestMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }
}
