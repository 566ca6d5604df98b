//! Scripted sessions for unit testing
//!
//! `MockConnector` hands out sessions that record every command into a shared
//! transcript and can be told to fail on a command or on open.

use crate::error::DeviceError;
use crate::session::{CommandSession, SendMode, SessionConnector, SessionTarget};
use std::sync::{Arc, Mutex};

/// A command recorded by a mock session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    /// Address of the session the command went to
    pub address: String,
    /// Command text
    pub command: String,
    /// Transmission mode
    pub mode: SendMode,
}

#[derive(Debug, Default)]
struct MockState {
    opened: Vec<SessionTarget>,
    sent: Vec<SentCommand>,
    closes: usize,
    fail_on: Option<String>,
    fail_open: Option<String>,
}

/// Mock connector for testing
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// Create a connector whose sessions accept every command
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first command containing `fragment`
    pub fn fail_on_command(&self, fragment: impl Into<String>) {
        self.state.lock().unwrap().fail_on = Some(fragment.into());
    }

    /// Fail every `open` with an authentication error for `user`
    pub fn fail_open(&self, user: impl Into<String>) {
        self.state.lock().unwrap().fail_open = Some(user.into());
    }

    /// Targets opened so far
    #[must_use]
    pub fn opened(&self) -> Vec<SessionTarget> {
        self.state.lock().unwrap().opened.clone()
    }

    /// Every command sent, across sessions
    #[must_use]
    pub fn sent(&self) -> Vec<SentCommand> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Command texts only
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.sent().into_iter().map(|c| c.command).collect()
    }

    /// Number of `close` calls
    #[must_use]
    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait::async_trait]
impl SessionConnector for MockConnector {
    async fn open(&self, target: &SessionTarget) -> Result<Box<dyn CommandSession>, DeviceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = &state.fail_open {
            return Err(DeviceError::Authentication(user.clone()));
        }
        state.opened.push(target.clone());
        Ok(Box::new(MockSession {
            address: target.address.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

/// Session handed out by [`MockConnector`]
#[derive(Debug)]
pub struct MockSession {
    address: String,
    state: Arc<Mutex<MockState>>,
}

#[async_trait::async_trait]
impl CommandSession for MockSession {
    async fn send_command(&mut self, command: &str, mode: SendMode) -> Result<String, DeviceError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(SentCommand {
            address: self.address.clone(),
            command: command.to_string(),
            mode,
        });
        if state.fail_on.as_deref().is_some_and(|f| command.contains(f)) {
            return Err(DeviceError::CommandFailed {
                command: command.to_string(),
                output: "Error: mock failure".to_string(),
            });
        }
        Ok(String::new())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
