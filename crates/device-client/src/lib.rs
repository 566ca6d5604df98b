//! Device CLI Client
//!
//! Interactive SSH command-line sessions to network operating systems.
//!
//! # Example
//!
//! ```no_run
//! use device_client::{
//!     CommandSession, Credentials, Platform, SendMode, SessionConnector, SessionTarget, SshConnector,
//! };
//!
//! # async fn example() -> Result<(), device_client::DeviceError> {
//! let target = SessionTarget {
//!     address: "10.0.0.1".to_string(),
//!     port: 22,
//!     credentials: Credentials { username: "admin".to_string(), password: "NokiaSrl1!".to_string() },
//!     platform: Platform::NokiaSrl,
//! };
//! let mut session = SshConnector::default().open(&target).await?;
//! session.send_command("enter candidate private", SendMode::Standard).await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod prompt;
pub mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{SshConnector, SshSession, DEFAULT_TIMEOUT};
pub use error::DeviceError;
pub use session::{CommandSession, Credentials, Platform, SendMode, SessionConnector, SessionTarget};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockConnector, MockSession, SentCommand};
