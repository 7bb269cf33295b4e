//! Failure types, one enum per collaborator.
//!
//! Nothing here is fatal to the process: the agent loop turns every
//! provider, tool and wallet failure into an error frame for the client.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("Wallet credentials missing: {0}")]
    MissingCredentials(String),

    #[error("Wallet service request failed: {message} (status: {status_code})")]
    ServiceError { status_code: u16, message: String },

    #[error("Wallet service unreachable: {0}")]
    Unreachable(String),

    #[error("Insufficient funds: need {needed} {asset}, have {available}")]
    InsufficientFunds {
        asset: String,
        needed: String,
        available: String,
    },

    #[error("Invalid wallet request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("Persona storage error: {0}")]
    Storage(String),

    #[error("Persona store rejected the record: {0}")]
    Rejected(String),

    #[error("Persona document is invalid: {0}")]
    Invalid(String),
}

/// The client transport is gone.
#[derive(Debug, Clone, Error)]
#[error("Transport error: {reason}")]
pub struct TransportError {
    pub reason: String,
}

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum TurnError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("A turn is already in progress for session {0}")]
    TurnAlreadyInFlight(String),

    #[error("Step limit of {max_steps} exceeded without a final answer")]
    StepLimitExceeded { max_steps: u32 },

    #[error("{0}")]
    ToolOrModel(String),

    #[error("Client disconnected")]
    ClientDisconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_carries_status() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn transport_error_names_reason() {
        let err = TransportError::new("socket closed");
        assert_eq!(err.to_string(), "Transport error: socket closed");
    }

    #[test]
    fn step_limit_message_names_the_limit() {
        let err = TurnError::StepLimitExceeded { max_steps: 3 };
        assert!(err.to_string().contains("Step limit of 3"));
    }

    #[test]
    fn wallet_error_displays_status() {
        let err = WalletError::ServiceError {
            status_code: 502,
            message: "upstream".into(),
        };
        assert!(err.to_string().contains("502"));
    }
}
