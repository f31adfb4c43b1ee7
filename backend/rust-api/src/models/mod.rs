pub mod answer;
pub mod leaderboard;
pub mod question;
pub mod session;
pub mod user_state;

pub use answer::{AnswerRecord, GradeOutcome, SubmitAnswerRequest, SubmitAnswerResponse};
pub use leaderboard::{Board, LeaderboardEntry, LeaderboardQuery, LeaderboardResponse, RankedEntry};
pub use question::{Difficulty, DifficultyRange, Question, QuestionFilter, QuestionSeed, QuestionView};
pub use session::{NextQuestionQuery, NextQuestionResponse, ResetStatsResponse, UserPath};
pub use user_state::{UserSessionState, UserSnapshot};
