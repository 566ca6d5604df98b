//! Session traits for mocking
//!
//! The SSH client implements these traits, and tests can use the scripted
//! mock behind the `test-util` feature.

use crate::error::DeviceError;
use std::fmt;

/// How a command is written to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Wait for the device to echo the command before sending the return.
    Standard,
    /// Send command and return together without waiting for the echo.
    ///
    /// Long quoted payloads (keys, certificates) echo unreliably, so they go
    /// out in this mode.
    Eager,
}

/// Device family, which decides prompt shape and session setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Nokia SR Linux
    NokiaSrl,
    /// Nokia SR OS (MD-CLI)
    NokiaSros,
}

impl Platform {
    /// Characters that terminate the CLI prompt
    #[must_use]
    pub fn prompt_terminators(self) -> &'static [char] {
        match self {
            Platform::NokiaSrl => &['#'],
            Platform::NokiaSros => &['#', '>'],
        }
    }

    /// Commands run once after the shell opens
    #[must_use]
    pub fn on_open(self) -> &'static [&'static str] {
        match self {
            Platform::NokiaSrl => &[
                "environment cli-engine type basic",
                "environment complete-on-space false",
            ],
            Platform::NokiaSros => &["environment console width 512", "environment more false"],
        }
    }
}

/// Username/password pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to open a session
#[derive(Debug, Clone)]
pub struct SessionTarget {
    /// Host address (IP or name)
    pub address: String,
    /// SSH port
    pub port: u16,
    /// Login credentials
    pub credentials: Credentials,
    /// Device family
    pub platform: Platform,
}

/// An open, authenticated CLI session
#[async_trait::async_trait]
pub trait CommandSession: Send {
    /// Send one command and return the device output.
    async fn send_command(&mut self, command: &str, mode: SendMode) -> Result<String, DeviceError>;

    /// Send a batch of commands in order, stopping at the first failure.
    async fn send_commands(
        &mut self,
        commands: &[String],
        mode: SendMode,
    ) -> Result<Vec<String>, DeviceError> {
        let mut outputs = Vec::with_capacity(commands.len());
        for command in commands {
            outputs.push(self.send_command(command, mode).await?);
        }
        Ok(outputs)
    }

    /// Close the session. Safe to call more than once.
    async fn close(&mut self) -> Result<(), DeviceError>;
}

/// Opens sessions to devices
#[async_trait::async_trait]
pub trait SessionConnector: Send + Sync {
    /// Open and authenticate a session to the target.
    async fn open(&self, target: &SessionTarget) -> Result<Box<dyn CommandSession>, DeviceError>;
}
