use serde::{Deserialize, Serialize};

/// A rendered email, ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Letter {
    pub email: String,
    pub subject: String,
    pub message: String,
}
