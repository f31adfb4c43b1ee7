use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Difficulty band of a question or a user, always within `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: Difficulty = Difficulty(1);
    pub const MAX: Difficulty = Difficulty(10);

    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0)
            .contains(&level)
            .then_some(Difficulty(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// One level up, saturating at 10.
    pub fn promoted(self) -> Self {
        Difficulty((self.0 + 1).min(Self::MAX.0))
    }

    /// One level down, saturating at 1.
    pub fn demoted(self) -> Self {
        Difficulty(self.0.saturating_sub(1).max(Self::MIN.0))
    }

    /// `[self - 1, self + 1]` clamped to the valid band.
    pub fn neighbourhood(self) -> DifficultyRange {
        DifficultyRange {
            min: self.demoted(),
            max: self.promoted(),
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<i64> for Difficulty {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Difficulty::new)
            .ok_or_else(|| format!("difficulty {} outside 1..=10", value))
    }
}

impl From<Difficulty> for i64 {
    fn from(value: Difficulty) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyRange {
    pub min: Difficulty,
    pub max: Difficulty,
}

impl DifficultyRange {
    pub fn exact(level: Difficulty) -> Self {
        Self {
            min: level,
            max: level,
        }
    }

    pub fn contains(&self, level: Difficulty) -> bool {
        self.min <= level && level <= self.max
    }
}

/// Multiple-choice item stored in the "questions" collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_answer: String,
}

impl Question {
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id.clone(),
            difficulty: self.difficulty,
            prompt: self.prompt.clone(),
            choices: self.choices.clone(),
        }
    }
}

/// Question as served to a client: the correct answer stays on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub choices: Vec<String>,
}

/// Catalog query: optional difficulty band plus ids to leave out.
#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub difficulty: Option<DifficultyRange>,
    pub exclude_ids: BTreeSet<String>,
}

impl QuestionFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn in_range(range: DifficultyRange) -> Self {
        Self {
            difficulty: Some(range),
            exclude_ids: BTreeSet::new(),
        }
    }

    pub fn excluding(mut self, ids: &BTreeSet<String>) -> Self {
        self.exclude_ids = ids.clone();
        self
    }

    pub fn matches(&self, question: &Question) -> bool {
        let in_band = self
            .difficulty
            .map(|range| range.contains(question.difficulty))
            .unwrap_or(true);
        in_band && !self.exclude_ids.contains(&question.id)
    }
}

/// Seed entry; `id` may be omitted and is then generated on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionSeed {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub choices: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub correct_answer: String,
}

impl QuestionSeed {
    pub fn into_question(self) -> Question {
        Question {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()),
            difficulty: self.difficulty,
            prompt: self.prompt,
            choices: self.choices,
            correct_answer: self.correct_answer,
        }
    }
}
