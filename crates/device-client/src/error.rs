//! Device session errors

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a device CLI session
#[derive(Debug, Error)]
pub enum DeviceError {
    /// SSH transport or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Password authentication was rejected
    #[error("authentication failed for user {0}")]
    Authentication(String),

    /// An operation exceeded the per-operation timeout
    #[error("timed out after {timeout:?} waiting for {operation}")]
    Timeout {
        /// What the session was waiting on
        operation: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// The remote side closed the channel
    #[error("session channel closed by {0}")]
    ChannelClosed(String),

    /// The device answered a command with an error
    #[error("command {command:?} failed: {output}")]
    CommandFailed {
        /// Command as sent
        command: String,
        /// Error line reported by the device
        output: String,
    },
}
