use thiserror::Error;

use super::service::LifecycleState;

/// Errors raised while building a gesture path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GestureError {
    /// The caller violated the builder contract (e.g. a non-positive duration).
    #[error("invalid gesture parameter: {0}")]
    InvalidParameter(String),
}

/// Errors raised by lifecycle misuse of the bridge service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// A bridge is already installed as the process-wide instance.
    #[error("a bridge service is already active in this process")]
    AlreadyActive,

    /// A lifecycle signal arrived in a state that cannot accept it.
    #[error("lifecycle signal '{signal}' is not valid in state {from:?}")]
    InvalidTransition {
        from: LifecycleState,
        signal: &'static str,
    },
}
