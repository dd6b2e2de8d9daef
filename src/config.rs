//! Process configuration
//!
//! Everything is read from the environment exactly once at startup and
//! carried around as an explicit value, there is no process-wide config

use std::net::SocketAddr;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;

const DEFAULT_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Application configuration
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub address: SocketAddr,

    /// Secret used to sign and verify session tokens
    pub jwt_secret: String,

    /// SMTP settings, `None` disables mail delivery
    pub smtp: Option<SmtpConfig>,
}

/// SMTP settings for the verification mailer
pub struct SmtpConfig {
    /// SMTP relay host, STARTTLS on the submission port
    pub host: String,

    /// Account used to authenticate against the relay
    pub username: String,

    /// Password for the relay account
    pub password: String,

    /// Mailbox used in the `From` header
    pub sender: String,
}

impl AppConfig {
    /// Load the configuration from the environment
    ///
    /// # Errors
    ///
    /// Will return `Err` when `JWT_SECRET` is missing or the bind address
    /// does not parse, both are startup failures
    pub fn from_env() -> Result<Self> {
        let Some(jwt_secret) = env_var("JWT_SECRET") else {
            bail!("`JWT_SECRET` is not set, refusing to start without a signing secret");
        };

        Ok(Self {
            address: address_from_env()?,
            jwt_secret,
            smtp: smtp_from_env(),
        })
    }
}

fn address_from_env() -> Result<SocketAddr> {
    let mut address = env_var("ADDRESS")
        .unwrap_or_else(|| String::from(DEFAULT_ADDRESS))
        .parse::<SocketAddr>()
        .context("Invalid `ADDRESS`")?;

    // optional override of just the port
    if let Some(port) = env_var("PORT") {
        let port = port.parse::<u16>().context("Invalid `PORT`")?;

        address.set_port(port);
    }

    Ok(address)
}

fn smtp_from_env() -> Option<SmtpConfig> {
    let username = env_var("EMAIL_HOST_USER");
    let password = env_var("EMAIL_HOST_PASSWORD");

    let (Some(username), Some(password)) = (username, password) else {
        tracing::warn!(
            "`EMAIL_HOST_USER`/`EMAIL_HOST_PASSWORD` not set, verification mails are disabled"
        );
        return None;
    };

    let sender =
        env_var("MAIL_FROM").unwrap_or_else(|| format!("Pine <{username}>"));

    Some(SmtpConfig {
        host: env_var("SMTP_HOST").unwrap_or_else(|| String::from(DEFAULT_SMTP_HOST)),
        username,
        password,
        sender,
    })
}

/// Get the value of an ENV var, when it is set and not empty
fn env_var(var_name: &'static str) -> Option<String> {
    std::env::var(var_name).ok().filter(|value| !value.is_empty())
}
