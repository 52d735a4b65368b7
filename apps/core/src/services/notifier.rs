use crate::config::MailConfig;
use crate::error::AppError;
use crate::models::LocationRecord;
use crate::services::Notifier;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

pub const NOTIFICATION_SUBJECT: &str = "Suicidal Attempt Detected";

/// The escalation payload: the whole transcript, then the location block when known.
pub fn escalation_message(transcript: &str, location: Option<&LocationRecord>) -> String {
    match location {
        Some(location) => format!("{}{}", transcript, location.notification_block()),
        None => transcript.to_string(),
    }
}

pub fn notification_body(message: &str) -> String {
    format!("Conversations related to suicidal attempt:\n\n{}", message)
}

/// Sends notifications through an authenticated STARTTLS relay.
pub struct SmtpNotifier {
    from: Mailbox,
    server: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, AppError> {
        Ok(Self {
            from: config.from.parse()?,
            server: config.server.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn build_message(&self, recipient: &str, message: &str) -> Result<Message, AppError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(recipient.parse()?)
            .subject(NOTIFICATION_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(notification_body(message))?;
        Ok(email)
    }

    fn credentials(&self) -> Result<Credentials, AppError> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Ok(Credentials::new(user.clone(), pass.clone())),
            _ => Err(AppError::Config(
                "SMTP_USERNAME and SMTP_PASSWORD must be set to send notifications".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, message))]
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), AppError> {
        let email = self.build_message(recipient, message)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.server)?
            .port(self.port)
            .credentials(self.credentials()?)
            .build();

        transport.send(email).await?;
        info!("Escalation notification delivered");
        Ok(())
    }
}
