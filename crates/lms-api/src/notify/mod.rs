pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;

pub use smtp::SmtpNotifier;

use crate::{error::ApiError, metrics};

/// A message to a user together with the values it is rendered from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    VerificationOtp { otp: String, expiry_minutes: i64 },
    PasswordResetOtp { otp: String, expiry_minutes: i64 },
    EnrollmentConfirmed { course_title: String },
}

/// Plain-text email ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Short name used in logs and metrics
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VerificationOtp { .. } => "verification_otp",
            Self::PasswordResetOtp { .. } => "password_reset_otp",
            Self::EnrollmentConfirmed { .. } => "enrollment_confirmed",
        }
    }

    /// The passcode carried by OTP notifications
    pub fn otp(&self) -> Option<&str> {
        match self {
            Self::VerificationOtp { otp, .. } | Self::PasswordResetOtp { otp, .. } => Some(otp),
            Self::EnrollmentConfirmed { .. } => None,
        }
    }

    pub fn render(&self, site_name: &str, recipient: &str) -> RenderedEmail {
        match self {
            Self::VerificationOtp { otp, expiry_minutes } => RenderedEmail {
                subject: format!("{site_name} - Email Verification Code"),
                body: format!(
                    "Hello {recipient},\n\n\
                     Thank you for registering with {site_name}!\n\n\
                     Your verification code is: {otp}\n\n\
                     This code will expire in {expiry_minutes} minutes.\n\n\
                     If you didn't request this code, please ignore this email.\n\n\
                     Regards,\nThe {site_name} Team"
                ),
            },
            Self::PasswordResetOtp { otp, expiry_minutes } => RenderedEmail {
                subject: format!("{site_name} - Password Reset Request"),
                body: format!(
                    "Hello {recipient},\n\n\
                     You requested a password reset for your {site_name} account.\n\n\
                     Your password reset code is: {otp}\n\n\
                     This code will expire in {expiry_minutes} minutes.\n\n\
                     If you didn't request this password reset, please ignore this email.\n\n\
                     Regards,\nThe {site_name} Team"
                ),
            },
            Self::EnrollmentConfirmed { course_title } => RenderedEmail {
                subject: format!("{site_name} - Enrollment Confirmed"),
                body: format!(
                    "Hello {recipient},\n\n\
                     You are now enrolled in \"{course_title}\".\n\n\
                     Your lessons are waiting for you in your dashboard.\n\n\
                     Regards,\nThe {site_name} Team"
                ),
            },
        }
    }
}

/// Delivers notifications to users
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), ApiError>;
}

/// Notifier used when no SMTP server is configured: writes messages to the log.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    site_name: String,
}

impl LogNotifier {
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), ApiError> {
        let email = notification.render(&self.site_name, recipient);
        tracing::info!(
            kind = notification.kind(),
            recipient,
            subject = %email.subject,
            "email delivery disabled, message logged instead"
        );
        tracing::debug!(body = %email.body, "email body");
        Ok(())
    }
}

/// Send a notification and wait for the outcome.
pub async fn deliver(
    notifier: &dyn Notifier,
    recipient: &str,
    notification: &Notification,
) -> Result<(), ApiError> {
    let result = notifier.send(recipient, notification).await;
    metrics::record_notification(notification.kind(), result.is_ok());
    result
}

/// Send a notification without waiting; failures are only logged.
pub fn deliver_in_background(
    notifier: Arc<dyn Notifier>,
    recipient: String,
    notification: Notification,
) {
    tokio::spawn(async move {
        if let Err(e) = deliver(notifier.as_ref(), &recipient, &notification).await {
            tracing::warn!(
                kind = notification.kind(),
                recipient = %recipient,
                error = %e,
                "failed to send notification"
            );
        }
    });
}
