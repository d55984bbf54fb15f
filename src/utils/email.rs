//! One-time-code email delivery.
//!
//! The orchestrator talks to a [`Mailer`] trait so tests can record sends
//! instead of hitting SMTP. [`LettreMailer`] is the production
//! implementation.

use async_trait::async_trait;
use lettre::message::{MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::instrument;

use crate::config::email::EmailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    Address(String),

    #[error("failed to build email: {0}")]
    Build(String),

    #[error("failed to send email: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends a one-time login code to `to_email`.
    async fn send_code(&self, to_email: &str, app_name: &str, code: &str)
    -> Result<(), MailError>;
}

pub struct LettreMailer {
    config: EmailConfig,
}

impl LettreMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport, MailError> {
        let mailer = if self.config.smtp_username.is_empty() {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
                .port(self.config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            );

            SmtpTransport::relay(&self.config.smtp_host)
                .map_err(|e| MailError::Transport(e.to_string()))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build()
        };

        Ok(mailer)
    }

    fn code_template(&self, app_name: &str, code: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Your login code</title>
</head>
<body style="margin: 0; padding: 0; font-family: Arial, sans-serif; background-color: #f4f4f4;">
    <table width="100%" cellpadding="0" cellspacing="0" style="background-color: #f4f4f4; padding: 20px;">
        <tr>
            <td align="center">
                <table width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; border-radius: 8px; overflow: hidden;">
                    <tr>
                        <td style="background-color: #4F46E5; padding: 30px; text-align: center;">
                            <h1 style="margin: 0; color: #ffffff; font-size: 28px;">{app_name}</h1>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding: 40px 30px;">
                            <h2 style="margin: 0 0 20px 0; color: #333333; font-size: 24px;">Your login code</h2>
                            <p style="margin: 0 0 20px 0; color: #666666; font-size: 16px; line-height: 1.5;">
                                Enter this code to finish signing in:
                            </p>
                            <p style="margin: 0 0 20px 0; color: #333333; font-size: 32px; letter-spacing: 6px; text-align: center; font-weight: bold;">
                                {code}
                            </p>
                            <p style="margin: 0; color: #666666; font-size: 14px; line-height: 1.5;">
                                The code expires in a few minutes. If you didn't request it, you can ignore this email.
                            </p>
                        </td>
                    </tr>
                    <tr>
                        <td style="background-color: #f8f9fa; padding: 20px 30px; text-align: center; border-top: 1px solid #e9ecef;">
                            <p style="margin: 0; color: #999999; font-size: 12px;">
                                This is an automated email from {app_name}. Please do not reply.
                            </p>
                        </td>
                    </tr>
                </table>
            </td>
        </tr>
    </table>
</body>
</html>"#
        )
    }
}

#[async_trait]
impl Mailer for LettreMailer {
    #[instrument(skip(self, code))]
    async fn send_code(
        &self,
        to_email: &str,
        app_name: &str,
        code: &str,
    ) -> Result<(), MailError> {
        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);

        let text_body = format!(
            "Your {} login code is: {}\n\n\
             Enter it to finish signing in. The code expires in a few minutes.\n\
             If you didn't request it, you can ignore this email.",
            app_name, code
        );
        let html_body = self.code_template(app_name, code);

        let email = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| MailError::Address(format!("from: {e}")))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| MailError::Address(format!("to: {e}")))?)
            .subject(format!("{} login code", app_name))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| MailError::Build(e.to_string()))?;

        let mailer = self.transport()?;

        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| MailError::Transport(format!("task join error: {e}")))?
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(())
    }
}
