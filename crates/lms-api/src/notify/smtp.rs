use async_trait::async_trait;
use lettre::{
    Message, SmtpTransport, Transport, message::Mailbox,
    transport::smtp::authentication::Credentials,
};

use super::{Notification, Notifier};
use crate::error::ApiError;

/// Sends notifications through an SMTP relay
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
    site_name: String,
}

impl SmtpNotifier {
    pub fn new(
        smtp_host: &str,
        smtp_username: &str,
        smtp_password: &str,
        from_email: &str,
        site_name: &str,
    ) -> Result<Self, ApiError> {
        let from: Mailbox = format!("{site_name} <{from_email}>")
            .parse()
            .map_err(|e| ApiError::Email(format!("Invalid from email: {e}")))?;

        let credentials = Credentials::new(smtp_username.to_string(), smtp_password.to_string());
        let transport = SmtpTransport::relay(smtp_host)
            .map_err(|e| ApiError::Email(format!("Failed to create SMTP transport: {e}")))?
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from,
            site_name: site_name.to_string(),
        })
    }

    fn build_message(&self, recipient: &str, notification: &Notification) -> Result<Message, ApiError> {
        let email = notification.render(&self.site_name, recipient);

        let to: Mailbox = recipient
            .parse()
            .map_err(|e| ApiError::Validation(format!("Invalid recipient email: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .body(email.body)
            .map_err(|e| ApiError::Email(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), ApiError> {
        let message = self.build_message(recipient, notification)?;
        let transport = self.transport.clone();

        // The SMTP transport is blocking
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await?
            .map_err(|e| ApiError::Email(format!("Failed to send email: {e}")))?;

        Ok(())
    }
}
