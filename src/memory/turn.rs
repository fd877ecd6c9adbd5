use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One exchange: what the user said and what the bot answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub user: String,
    pub bot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Turn {
    pub fn new(user: &str, bot: &str) -> Self {
        let now = Utc::now();
        Self {
            id: generate_turn_id(now),
            user: user.to_string(),
            bot: bot.to_string(),
            timestamp: Some(now),
        }
    }

    /// Calendar date of the turn in the local timezone
    pub fn local_date(&self) -> Option<NaiveDate> {
        self.timestamp.map(|ts| ts.with_timezone(&Local).date_naive())
    }

    /// Text fed to the embedding model for this turn
    pub fn embedding_text(&self) -> String {
        format!("User: {}\nBot: {}", self.user, self.bot)
    }
}

/// `turn_<unix seconds>_<8 hex chars>`
fn generate_turn_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("turn_{}_{}", now.timestamp(), &suffix[..8])
}
