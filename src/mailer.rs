//! Verification code delivery
//!
//! Delivery is fire-and-forget: [`dispatch_verification_code`] hands the mail
//! to a detached task, failures are logged and never reach the caller.

use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use thiserror::Error;

use crate::config::SmtpConfig;

/// Mail delivery errors
#[derive(Debug, Error)]
pub enum MailError {
    /// The recipient address does not parse
    #[error("invalid recipient address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The message could not be assembled
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    /// The relay rejected or never received the message
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// The verification mailer
///
/// Falls back to [`Mailer::Disabled`] when no SMTP credentials are
/// configured, the code is then only visible in the logs
#[derive(Clone)]
pub enum Mailer {
    /// Deliver through an SMTP relay, STARTTLS on the submission port
    Smtp {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        sender: Mailbox,
    },

    /// No delivery, log the code instead
    Disabled,
}

impl Mailer {
    /// Build a mailer from the (optional) SMTP configuration
    pub fn from_config(config: Option<&SmtpConfig>) -> Self {
        let Some(config) = config else {
            return Self::Disabled;
        };

        let sender = match config.sender.parse::<Mailbox>() {
            Ok(sender) => sender,
            Err(err) => {
                tracing::error!("Invalid `MAIL_FROM` mailbox, mails are disabled: {err}");
                return Self::Disabled;
            }
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host) {
            Ok(builder) => builder
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build(),
            Err(err) => {
                tracing::error!("Invalid SMTP relay `{}`, mails are disabled: {err}", config.host);
                return Self::Disabled;
            }
        };

        Self::Smtp { transport, sender }
    }

    /// Send a verification code to an address
    ///
    /// # Errors
    ///
    /// Will return `Err` when the address does not parse, or the relay
    /// refuses the message
    pub async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), MailError> {
        match self {
            Self::Smtp { transport, sender } => {
                let message = Message::builder()
                    .from(sender.clone())
                    .to(to.parse()?)
                    .subject("Email Verification - Pine")
                    .header(ContentType::TEXT_HTML)
                    .body(verification_body(code))?;

                transport.send(message).await?;

                tracing::info!("Verification code sent to {to}");

                Ok(())
            }
            Self::Disabled => {
                tracing::debug!("Mail delivery disabled, verification code for {to}: {code}");

                Ok(())
            }
        }
    }
}

/// Send a verification code on a detached task
///
/// The request that triggered the code never waits for delivery, a failed
/// delivery is logged and the triggering response is unaffected
pub fn dispatch_verification_code(mailer: &Mailer, email: String, code: String) {
    let mailer = mailer.clone();

    tokio::spawn(async move {
        if let Err(err) = mailer.send_verification_code(&email, &code).await {
            tracing::error!("Could not deliver verification code to {email}: {err}");
        }
    });
}

/// The HTML body of the verification mail
fn verification_body(code: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"></head>
<body style="font-family: Arial, sans-serif; margin:0; padding:0; background:#f9f9f9;">
    <table align="center" width="600" style="background:#ffffff; border-radius:8px; padding:30px;">
        <tr>
            <td style="text-align:center;">
                <h2 style="margin-bottom:10px; color:#333;">Email Verification</h2>
                <p style="color:#555; font-size:16px;">Use the code below to verify your email address:</p>
                <p style="font-size:32px; font-weight:bold; letter-spacing:4px; margin:20px 0; color:#111;">{code}</p>
                <p style="font-size:14px; color:#777;">This code expires in 10 minutes.</p>
                <p style="font-size:14px; color:#777; margin-top:20px;">If you did not request this code, you can ignore this email.</p>
            </td>
        </tr>
        <tr>
            <td style="text-align:center; font-size:12px; color:#aaa; padding-top:20px;">
                &copy; 2025 Pine. All rights reserved.
            </td>
        </tr>
    </table>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_mailer_swallows_sends() {
        let mailer = Mailer::from_config(None);

        assert!(
            mailer
                .send_verification_code("ann@x.com", "123456")
                .await
                .is_ok()
        );
    }

    #[test]
    fn test_verification_body_carries_the_code() {
        assert!(verification_body("424242").contains("424242"));
    }
}
