use std::fmt;

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize};

use crate::repository::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Excited,
    Peaceful,
    Hopeful,
    Nostalgic,
    Determined,
    #[default]
    Unspecified,
}

impl Mood {
    /// Unknown names map to `Unspecified` rather than failing, so documents
    /// written by older clients still load.
    pub fn from_name(name: &str) -> Self {
        match name {
            "happy" => Mood::Happy,
            "excited" => Mood::Excited,
            "peaceful" => Mood::Peaceful,
            "hopeful" => Mood::Hopeful,
            "nostalgic" => Mood::Nostalgic,
            "determined" => Mood::Determined,
            _ => Mood::Unspecified,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Mood::Happy => "😊",
            Mood::Excited => "🤩",
            Mood::Peaceful => "😌",
            Mood::Hopeful => "🌟",
            Mood::Nostalgic => "🥹",
            Mood::Determined => "💪",
            Mood::Unspecified => "💌",
        }
    }
}

impl<'de> Deserialize<'de> for Mood {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Mood::from_name(&name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapsuleStatus {
    #[default]
    Waiting,
    Delivered,
}

impl CapsuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapsuleStatus::Waiting => "waiting",
            CapsuleStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for CapsuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored letter. Field names match the documents in the `capsules`
/// collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capsule {
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub mood: Mood,
    pub delivery_date: NaiveDate,
    pub created_at: i64,
    pub email_sent: bool,
    #[serde(default)]
    pub status: CapsuleStatus,
    #[serde(default)]
    pub delivered_at: Option<i64>,
}

impl Capsule {
    /// Builds a fresh, undelivered capsule. `created_at` is in microseconds.
    pub fn seal(create: CreateCapsule, created_at: i64) -> Self {
        Self {
            id: ObjectId::new(),
            name: create.name,
            email: create.email,
            subject: create.subject,
            body: create.body,
            mood: create.mood.unwrap_or_default(),
            delivery_date: create.delivery_date,
            created_at,
            email_sent: false,
            status: CapsuleStatus::Waiting,
            delivered_at: None,
        }
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        !self.email_sent && self.delivery_date <= today
    }
}

impl Entity for Capsule {
    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCapsule {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub mood: Option<Mood>,
    pub delivery_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCapsule {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
    pub mood: Mood,
    pub delivery_date: NaiveDate,
    pub created_at: i64,
    pub email_sent: bool,
    pub status: CapsuleStatus,
    pub delivered_at: Option<i64>,
}

impl From<Capsule> for PublicCapsule {
    fn from(capsule: Capsule) -> Self {
        Self {
            id: capsule.id.to_hex(),
            name: capsule.name,
            email: capsule.email,
            subject: capsule.subject,
            body: capsule.body,
            mood: capsule.mood,
            delivery_date: capsule.delivery_date,
            created_at: capsule.created_at,
            email_sent: capsule.email_sent,
            status: capsule.status,
            delivered_at: capsule.delivered_at,
        }
    }
}
