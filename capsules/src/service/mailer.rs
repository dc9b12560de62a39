use std::sync::Arc;

use async_trait::async_trait;
use common::entities::{capsule::Capsule, letter::Letter};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, Message, SmtpTransport, Transport,
};
use once_cell::sync::OnceCell;

use crate::{config::MailConfig, error::MailError, service::template::LetterFormatter};

/// Sends the emails a capsule produces. A single attempt per call; callers
/// decide what a failure means.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_delivery(&self, capsule: &Capsule) -> Result<(), MailError>;
    async fn send_confirmation(&self, capsule: &Capsule) -> Result<(), MailError>;
}

/// SMTP mailer. The transport is built on the first send, so missing
/// credentials only surface once something is actually mailed.
pub struct SmtpMailer {
    config: MailConfig,
    formatter: Arc<dyn LetterFormatter>,
    transport: OnceCell<SmtpTransport>,
}

fn parse_address(address: &str) -> Result<Address, MailError> {
    address
        .trim()
        .parse()
        .map_err(|source| MailError::InvalidAddress {
            address: address.to_string(),
            source,
        })
}

impl SmtpMailer {
    pub fn new(config: MailConfig, formatter: Arc<dyn LetterFormatter>) -> Self {
        Self {
            config,
            formatter,
            transport: OnceCell::new(),
        }
    }

    fn transport(&self) -> Result<&SmtpTransport, MailError> {
        self.transport.get_or_try_init(|| {
            let (Some(account), Some(password)) =
                (self.config.sender_account.clone(), self.config.credential.clone())
            else {
                return Err(MailError::MissingCredentials);
            };

            Ok(SmtpTransport::relay(&self.config.relay)?
                .credentials(Credentials::new(account, password))
                .build())
        })
    }

    fn build_message(&self, letter: &Letter) -> Result<Message, MailError> {
        let Some(account) = self.config.sender_account.as_deref() else {
            return Err(MailError::MissingCredentials);
        };

        let from = Mailbox::new(Some(self.config.display_name.clone()), parse_address(account)?);
        let to = Mailbox::new(None, parse_address(&letter.email)?);

        Ok(Message::builder()
            .from(from)
            .to(to)
            .subject(letter.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(letter.message.clone())?)
    }

    async fn send(&self, letter: Letter) -> Result<(), MailError> {
        let transport = self.transport()?.clone();
        let message = self.build_message(&letter)?;

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(MailError::Worker)??;

        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_delivery(&self, capsule: &Capsule) -> Result<(), MailError> {
        self.send(self.formatter.delivery(capsule)).await
    }

    async fn send_confirmation(&self, capsule: &Capsule) -> Result<(), MailError> {
        self.send(self.formatter.confirmation(capsule)).await
    }
}
