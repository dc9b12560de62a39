use common::error::{AddCode, ServiceError};
use derive_more::{Display, Error};
use mongodb::bson::oid::ObjectId;

#[derive(Debug, Display, Error)]
pub enum StoreError {
    #[display(fmt = "Database error: {}", _0)]
    Database(mongodb::error::Error),
    #[display(fmt = "Capsule {} not found", id)]
    NotFound { id: ObjectId },
    #[display(fmt = "Capsule {} was already delivered", id)]
    AlreadyDelivered { id: ObjectId },
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Database(err)
    }
}

impl StoreError {
    pub fn into_service_error(self) -> ServiceError {
        let code = match self {
            StoreError::NotFound { .. } => 404,
            StoreError::AlreadyDelivered { .. } => 409,
            StoreError::Database(_) => 500,
        };
        self.code(code)
    }
}

#[derive(Debug, Display, Error)]
pub enum MailError {
    #[display(fmt = "Mail credentials are not configured")]
    MissingCredentials,
    #[display(fmt = "Invalid address {}: {}", address, source)]
    InvalidAddress {
        address: String,
        source: lettre::address::AddressError,
    },
    #[display(fmt = "Error building email: {}", _0)]
    Message(lettre::error::Error),
    #[display(fmt = "Error sending email: {}", _0)]
    Transport(lettre::transport::smtp::Error),
    #[display(fmt = "Mail worker failed: {}", _0)]
    Worker(tokio::task::JoinError),
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        MailError::Message(err)
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        MailError::Transport(err)
    }
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[display(fmt = "Name is required")]
    MissingName,
    #[display(fmt = "Email is required")]
    MissingEmail,
    #[display(fmt = "Email is not a valid address")]
    InvalidEmail,
    #[display(fmt = "Subject is required")]
    MissingSubject,
    #[display(fmt = "Letter body is required")]
    MissingBody,
    #[display(fmt = "Delivery date must be after {}", today)]
    DeliveryDateTooEarly { today: chrono::NaiveDate },
}

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display(fmt = "Missing environment variable {}", name)]
    Missing { name: String },
    #[display(fmt = "Invalid value for {}: {}", name, value)]
    Invalid { name: String, value: String },
    #[display(fmt = "Invalid cron schedule: {}", _0)]
    Cron(cron::error::Error),
}

impl From<cron::error::Error> for ConfigError {
    fn from(err: cron::error::Error) -> Self {
        ConfigError::Cron(err)
    }
}
