//! SSH implementation of the session traits

use crate::error::DeviceError;
use crate::prompt;
use crate::session::{CommandSession, Platform, SendMode, SessionConnector, SessionTarget};
use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-operation timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Freshly provisioned devices have no known identity, so every host key is
/// accepted.
#[derive(Debug)]
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Opens password-authenticated SSH shell sessions
#[derive(Debug, Clone)]
pub struct SshConnector {
    timeout: Duration,
}

impl SshConnector {
    /// Create a connector with the given per-operation timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl SessionConnector for SshConnector {
    async fn open(&self, target: &SessionTarget) -> Result<Box<dyn CommandSession>, DeviceError> {
        let session = SshSession::open(target, self.timeout).await?;
        Ok(Box::new(session))
    }
}

/// An interactive shell over SSH
pub struct SshSession {
    handle: Handle<AcceptAnyHostKey>,
    channel: Channel<Msg>,
    platform: Platform,
    timeout: Duration,
    address: String,
    closed: bool,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("address", &self.address)
            .field("platform", &self.platform)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SshSession {
    /// Connect, authenticate and start a shell on the target.
    pub async fn open(target: &SessionTarget, timeout: Duration) -> Result<Self, DeviceError> {
        debug!("Opening SSH session to {}:{}", target.address, target.port);

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(timeout * 12),
            ..Default::default()
        });

        let mut handle = bounded(
            timeout,
            "connect",
            client::connect(config, (target.address.as_str(), target.port), AcceptAnyHostKey),
        )
        .await??;

        let authenticated = bounded(
            timeout,
            "authentication",
            handle.authenticate_password(
                target.credentials.username.clone(),
                target.credentials.password.clone(),
            ),
        )
        .await??;
        if !authenticated {
            return Err(DeviceError::Authentication(target.credentials.username.clone()));
        }

        let channel = bounded(timeout, "session channel", handle.channel_open_session()).await??;
        channel.request_pty(false, "xterm", 511, 24, 0, 0, &[]).await?;
        channel.request_shell(false).await?;

        let mut session = Self {
            handle,
            channel,
            platform: target.platform,
            timeout,
            address: target.address.clone(),
            closed: false,
        };

        session.read_until_prompt("login prompt").await?;
        for command in target.platform.on_open() {
            session.send_command(command, SendMode::Eager).await?;
        }

        Ok(session)
    }

    async fn write(&mut self, data: &str) -> Result<(), DeviceError> {
        self.channel.data(data.as_bytes()).await?;
        Ok(())
    }

    async fn read_until<F>(&mut self, operation: &str, mut done: F) -> Result<String, DeviceError>
    where
        F: FnMut(&str) -> bool + Send,
    {
        let timeout = self.timeout;
        let channel = &mut self.channel;
        let address = self.address.clone();

        bounded(timeout, operation, async move {
            let mut buffer = String::new();
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { ref data }) | Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                        buffer.push_str(&String::from_utf8_lossy(data));
                        if done(&buffer) {
                            return Ok(buffer);
                        }
                    }
                    Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                        return Err(DeviceError::ChannelClosed(address));
                    }
                    Some(_) => {}
                }
            }
        })
        .await?
    }

    async fn read_until_prompt(&mut self, operation: &str) -> Result<String, DeviceError> {
        let terminators = self.platform.prompt_terminators();
        self.read_until(operation, |buffer| prompt::ends_with_prompt(buffer, terminators))
            .await
    }
}

#[async_trait]
impl CommandSession for SshSession {
    async fn send_command(&mut self, command: &str, mode: SendMode) -> Result<String, DeviceError> {
        debug!("{} <- {} ({:?})", self.address, command, mode);

        match mode {
            SendMode::Standard => {
                self.write(command).await?;
                self.read_until("command echo", |buffer| prompt::fuzzy_contains(buffer, command))
                    .await?;
                self.write("\n").await?;
            }
            SendMode::Eager => {
                self.write(&format!("{command}\n")).await?;
            }
        }

        let output = self.read_until_prompt(command).await?;
        if let Some(line) = prompt::error_line(&output) {
            return Err(DeviceError::CommandFailed {
                command: command.to_string(),
                output: line.to_string(),
            });
        }
        Ok(output)
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.channel.eof().await {
            warn!("Failed to send EOF to {}: {}", self.address, e);
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        debug!("Closed SSH session to {}", self.address);
        Ok(())
    }
}

async fn bounded<F, T>(timeout: Duration, operation: &str, future: F) -> Result<T, DeviceError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_elapsed| DeviceError::Timeout {
            operation: operation.to_string(),
            timeout,
        })
}
