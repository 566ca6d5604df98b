//! Device bootstrap protocol.
//!
//! Once a node pod is reachable, its management plane is configured over an
//! interactive CLI session: a TLS server profile is installed from the
//! intent's certificate secret, the management services are enabled on the
//! `mgmt` network instance and the candidate is committed.

mod certificate;

pub use certificate::{CertificateBundle, CertificateError};

use device_client::{CommandSession, Credentials, DeviceError, SendMode, SessionConnector, SessionTarget};
use k8s_openapi::api::core::v1::Secret;
use tracing::{info, warn};

/// Name of the TLS server profile created on the device
pub const CERTIFICATE_PROFILE: &str = "k8s-profile";
/// Credential secret key holding the login user
pub const USERNAME_KEY: &str = "username";
/// Credential secret key holding the login password
pub const PASSWORD_KEY: &str = "password";

const MGMT_NETWORK_INSTANCE: &str = "mgmt";

/// Reads the login pair from a credential secret.
pub fn credentials_from_secret(secret: &Secret) -> Option<Credentials> {
    let data = secret.data.as_ref()?;
    let field = |key: &str| {
        data.get(key)
            .map(|v| String::from_utf8_lossy(&v.0).trim_end().to_string())
    };
    Some(Credentials {
        username: field(USERNAME_KEY)?,
        password: field(PASSWORD_KEY)?,
    })
}

/// A group of commands sent with the same mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub commands: Vec<String>,
    pub mode: SendMode,
}

impl ScriptStep {
    fn standard(commands: Vec<String>) -> Self {
        Self {
            commands,
            mode: SendMode::Standard,
        }
    }

    fn eager(command: String) -> Self {
        Self {
            commands: vec![command],
            mode: SendMode::Eager,
        }
    }
}

/// Ordered command transcript for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapScript {
    steps: Vec<ScriptStep>,
}

impl BootstrapScript {
    /// Management-plane transcript in SR Linux CLI syntax.
    pub fn management_plane(certs: &CertificateBundle) -> Self {
        let profile = &certs.profile_name;
        let tls = format!("set / system tls server-profile {profile}");
        let ni = MGMT_NETWORK_INSTANCE;

        let services = vec![
            "set / system lldp admin-state enable".to_string(),
            "set / system gnmi-server admin-state enable".to_string(),
            "set / system gnmi-server rate-limit 65000".to_string(),
            "set / system gnmi-server trace-options [ common request response ]".to_string(),
            format!("set / system gnmi-server network-instance {ni} admin-state enable"),
            format!("set / system gnmi-server network-instance {ni} tls-profile {profile}"),
            format!("set / system gnmi-server network-instance {ni} unix-socket admin-state enable"),
            "set / system gribi-server admin-state enable".to_string(),
            format!("set / system gribi-server network-instance {ni} admin-state enable"),
            format!("set / system gribi-server network-instance {ni} tls-profile {profile}"),
            "set / system json-rpc-server admin-state enable".to_string(),
            format!("set / system json-rpc-server network-instance {ni} http admin-state enable"),
            format!("set / system json-rpc-server network-instance {ni} https admin-state enable"),
            format!("set / system json-rpc-server network-instance {ni} https tls-profile {profile}"),
            "set / system p4rt-server admin-state enable".to_string(),
            format!("set / system p4rt-server network-instance {ni} admin-state enable"),
            format!("set / system p4rt-server network-instance {ni} tls-profile {profile}"),
        ];

        Self {
            steps: vec![
                ScriptStep::standard(vec!["enter candidate private".to_string()]),
                ScriptStep::standard(vec![tls.clone(), format!("{tls} authenticate-client false")]),
                ScriptStep::eager(format!("{tls} key \"{}\"", certs.key)),
                ScriptStep::eager(format!("{tls} certificate \"{}\"", certs.cert)),
                ScriptStep::eager(format!("{tls} trust-anchor \"{}\"", certs.ca)),
                ScriptStep::standard(services),
                ScriptStep::standard(vec!["commit save".to_string()]),
            ],
        }
    }

    /// Adds a login banner just before the commit.
    #[must_use]
    pub fn with_login_banner(mut self, banner: &str) -> Self {
        let at = self.steps.len().saturating_sub(1);
        self.steps.insert(
            at,
            ScriptStep::eager(format!("set / system banner login-banner \"{banner}\"")),
        );
        self
    }

    /// Steps in transmission order
    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }
}

/// Opens a session to `target`, runs the script and always closes the
/// session before returning.
///
/// A script failure takes precedence over a failure to close.
pub async fn run_bootstrap(
    connector: &dyn SessionConnector,
    target: &SessionTarget,
    script: &BootstrapScript,
) -> Result<(), DeviceError> {
    info!("Bootstrapping device at {}", target.address);
    let mut session = connector.open(target).await?;

    let result = run_steps(session.as_mut(), script).await;
    let closed = session.close().await;

    if let Err(e) = result {
        if let Err(close_error) = closed {
            warn!("Failed to close session to {}: {}", target.address, close_error);
        }
        return Err(e);
    }
    closed?;

    info!("Bootstrapped device at {}", target.address);
    Ok(())
}

async fn run_steps(session: &mut dyn CommandSession, script: &BootstrapScript) -> Result<(), DeviceError> {
    for step in script.steps() {
        session.send_commands(&step.commands, step.mode).await?;
    }
    Ok(())
}
