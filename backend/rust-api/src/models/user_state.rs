use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::question::Difficulty;

/// Adaptive quiz state of one user, stored in the "user_states" collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSessionState {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub score: u64,
    pub streak: u32,
    /// Best streak ever reached. Not touched by a stats reset.
    #[serde(default)]
    pub max_streak: u32,
    /// Consecutive correct answers since the last difficulty change.
    pub momentum: u8,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub used_question_ids: BTreeSet<String>,
    #[serde(default)]
    pub streak_question_ids: BTreeSet<String>,
    pub state_version: u64,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl UserSessionState {
    /// Default state assigned on first contact.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            score: 0,
            streak: 0,
            max_streak: 0,
            momentum: 0,
            difficulty: Difficulty::MIN,
            used_question_ids: BTreeSet::new(),
            streak_question_ids: BTreeSet::new(),
            state_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reinitializes the stats in place as one committed mutation.
    pub fn reset(&mut self) {
        self.score = 0;
        self.streak = 0;
        self.momentum = 0;
        self.difficulty = Difficulty::MIN;
        self.used_question_ids.clear();
        self.streak_question_ids.clear();
        self.state_version += 1;
    }

    /// Starts a new question cycle. Returns false when there was nothing to clear.
    pub fn start_new_cycle(&mut self) -> bool {
        if self.used_question_ids.is_empty() && self.streak_question_ids.is_empty() {
            return false;
        }
        self.used_question_ids.clear();
        // streak ids must stay a subset of the used ids
        self.streak_question_ids.clear();
        self.state_version += 1;
        true
    }

    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            user_id: self.user_id.clone(),
            score: self.score,
            streak: self.streak,
            max_streak: self.max_streak,
            difficulty: self.difficulty,
            state_version: self.state_version,
        }
    }
}

/// Client-facing view of the user state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: String,
    pub score: u64,
    pub streak: u32,
    pub max_streak: u32,
    pub difficulty: Difficulty,
    pub state_version: u64,
}

// Serde converters for chrono::DateTime <-> mongodb::bson::DateTime
pub(crate) mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bson_dt = bson::DateTime::from_millis(date.timestamp_millis());
        bson_dt.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
            .ok_or_else(|| D::Error::custom("timestamp out of range"))
    }
}
