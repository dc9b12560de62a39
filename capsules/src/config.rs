use std::{str::FromStr, time::Duration};

use chrono::{FixedOffset, Offset, Utc};

use crate::error::ConfigError;

/// How the service talks to the SMTP relay. Credentials stay optional here;
/// the mailer reports them missing when it first tries to send.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender_account: Option<String>,
    pub credential: Option<String>,
    pub display_name: String,
    pub relay: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender_account: None,
            credential: None,
            display_name: "Time Capsule".to_string(),
            relay: "smtp.gmail.com".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Cron expression with a seconds field, read in the business timezone.
    pub cron: String,
    pub utc_offset: FixedOffset,
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 9 * * *".to_string(),
            utc_offset: FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix()),
            concurrency: 4,
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongo_uri: String,
    pub database: String,
    pub collection: String,
    pub port: u16,
    pub mail: MailConfig,
    pub delivery: DeliveryConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let Some(mongo_uri) = optional("MONGOURI") else {
            return Err(ConfigError::Missing {
                name: "MONGOURI".to_string(),
            });
        };

        let defaults = MailConfig::default();
        let mail = MailConfig {
            sender_account: optional("CAPSULE_MAIL_ADDRESS"),
            credential: optional("CAPSULE_MAIL_PASSWORD"),
            display_name: optional("CAPSULE_MAIL_NAME").unwrap_or(defaults.display_name),
            relay: optional("CAPSULE_SMTP_RELAY").unwrap_or(defaults.relay),
        };

        let defaults = DeliveryConfig::default();
        let offset_hours: i32 = parse_or(
            "CAPSULE_UTC_OFFSET_HOURS",
            optional("CAPSULE_UTC_OFFSET_HOURS"),
            defaults.utc_offset.local_minus_utc() / 3600,
        )?;
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or(ConfigError::Invalid {
            name: "CAPSULE_UTC_OFFSET_HOURS".to_string(),
            value: offset_hours.to_string(),
        })?;

        let concurrency: usize = parse_or(
            "CAPSULE_DELIVERY_CONCURRENCY",
            optional("CAPSULE_DELIVERY_CONCURRENCY"),
            defaults.concurrency,
        )?;
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "CAPSULE_DELIVERY_CONCURRENCY".to_string(),
                value: "0".to_string(),
            });
        }

        let timeout_secs: u64 = parse_or(
            "CAPSULE_DELIVERY_TIMEOUT_SECS",
            optional("CAPSULE_DELIVERY_TIMEOUT_SECS"),
            defaults.timeout.as_secs(),
        )?;

        let delivery = DeliveryConfig {
            cron: optional("CAPSULE_DELIVERY_CRON").unwrap_or(defaults.cron),
            utc_offset,
            concurrency,
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            mongo_uri,
            database: optional("CAPSULE_DATABASE").unwrap_or_else(|| "timecapsule".to_string()),
            collection: optional("CAPSULE_COLLECTION").unwrap_or_else(|| "capsules".to_string()),
            port: parse_or("PORT", optional("PORT"), 3011)?,
            mail,
            delivery,
        })
    }
}

fn parse_or<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            value,
        }),
    }
}
