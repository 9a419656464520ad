//! Transactional email.
//!
//! Uses SMTP via lettre with Askama HTML and plain-text templates. Without
//! SMTP configuration, messages are logged instead of sent so local runs and
//! tests need no mail server.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use agrisathi_core::Email;

use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    name: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    name: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify_email.html")]
struct VerifyEmailHtml<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify_email.txt")]
struct VerifyEmailText<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    link: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Log,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    transport: Transport,
    from_address: String,
    base_url: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = match self.transport {
            Transport::Smtp(_) => "smtp",
            Transport::Log => "log",
        };
        f.debug_struct("EmailService")
            .field("transport", &transport)
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

impl EmailService {
    /// Create an SMTP-backed service.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, base_url: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport: Transport::Smtp(mailer),
            from_address: config.from_address.clone(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// A service that logs instead of sending.
    #[must_use]
    pub fn log_only(base_url: &str) -> Self {
        Self {
            transport: Transport::Log,
            from_address: "AgriSathi <no-reply@localhost>".to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Send the post-registration welcome email.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome(&self, to: &Email, name: &str) -> Result<(), EmailError> {
        let html = WelcomeEmailHtml { name }.render()?;
        let text = WelcomeEmailText { name }.render()?;

        self.send_multipart_email(to, "Welcome to AgriSathi", &text, &html)
            .await
    }

    /// Send an email verification link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_verification(
        &self,
        to: &Email,
        name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let link = format!("{}/verify-email?token={token}", self.base_url);
        let html = VerifyEmailHtml { name, link: &link }.render()?;
        let text = VerifyEmailText { name, link: &link }.render()?;

        self.send_multipart_email(to, "Verify your AgriSathi email", &text, &html)
            .await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(
        &self,
        to: &Email,
        name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let link = format!("{}/reset-password?token={token}", self.base_url);
        let html = PasswordResetHtml { name, link: &link }.render()?;
        let text = PasswordResetText { name, link: &link }.render()?;

        self.send_multipart_email(to, "Reset your AgriSathi password", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &Email,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let mailer = match &self.transport {
            Transport::Smtp(mailer) => mailer,
            Transport::Log => {
                tracing::info!(to = %to, subject, "SMTP not configured, email not sent");
                return Ok(());
            }
        };

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        mailer.send(email).await?;

        tracing::info!(to = %to, subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_render_link() {
        let link = "http://localhost:3000/verify-email?token=abc";
        let html = VerifyEmailHtml { name: "Sita", link }.render().unwrap();
        let text = VerifyEmailText { name: "Sita", link }.render().unwrap();
        assert!(html.contains("Sita"));
        assert!(text.contains(link));
    }

    #[test]
    fn test_html_escapes_name() {
        let html = WelcomeEmailHtml {
            name: "<script>",
        }
        .render()
        .unwrap();
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_log_only_succeeds_without_smtp() {
        let service = EmailService::log_only("http://localhost:3000/");
        let to = Email::parse("sita@example.com").unwrap();
        service.send_welcome(&to, "Sita").await.unwrap();
        service.send_password_reset(&to, "Sita", "tok").await.unwrap();
    }
}
