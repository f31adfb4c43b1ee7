//! Adaptive difficulty and scoring rules applied once per graded answer.
//!
//! Difficulty climbs only after two consecutive correct answers at the
//! current level (momentum) and drops immediately on a miss. Correct answers
//! score `difficulty * 10` scaled by a streak multiplier capped at 2.5x.

use crate::models::{Question, UserSessionState};

/// Consecutive correct answers needed for a promotion.
pub const MOMENTUM_THRESHOLD: u8 = 2;
pub const STREAK_BONUS_STEP: f64 = 0.1;
pub const MAX_MULTIPLIER: f64 = 2.5;
/// Awarded when the score computation does not yield a finite number.
pub const FALLBACK_SCORE_DELTA: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: UserSessionState,
    pub is_correct: bool,
    pub score_delta: u64,
}

/// Case- and whitespace-insensitive comparison of a submitted answer.
pub fn answers_match(submitted: &str, expected: &str) -> bool {
    submitted.trim().to_lowercase() == expected.trim().to_lowercase()
}

pub fn streak_multiplier(streak: u32) -> f64 {
    (1.0 + f64::from(streak) * STREAK_BONUS_STEP).min(MAX_MULTIPLIER)
}

fn score_for(difficulty: u8, streak: u32) -> u64 {
    let raw = (f64::from(difficulty) * 10.0 * streak_multiplier(streak)).round();
    if raw.is_finite() && raw >= 0.0 {
        raw as u64
    } else {
        FALLBACK_SCORE_DELTA
    }
}

/// Computes the state following an answer to `question`. Pure: persisting the
/// returned state is up to the caller.
pub fn apply(state: &UserSessionState, question: &Question, submitted: &str) -> Transition {
    let mut next = state.clone();
    let is_correct = answers_match(submitted, &question.correct_answer);
    let difficulty_before = state.difficulty;

    let score_delta = if is_correct {
        next.momentum += 1;
        next.streak += 1;
        next.max_streak = next.max_streak.max(next.streak);
        next.streak_question_ids.insert(question.id.clone());

        if next.momentum >= MOMENTUM_THRESHOLD {
            next.difficulty = difficulty_before.promoted();
            next.momentum = 0;
        }

        score_for(difficulty_before.get(), next.streak)
    } else {
        next.momentum = 0;
        next.streak = 0;
        next.difficulty = difficulty_before.demoted();
        next.streak_question_ids.clear();
        0
    };

    next.used_question_ids.insert(question.id.clone());
    next.score += score_delta;
    next.state_version += 1;

    Transition {
        state: next,
        is_correct,
        score_delta,
    }
}
