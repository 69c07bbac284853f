//! Task-type scoring rules
//!
//! Turns raw answers into an attempt score and a completion flag. The
//! pass thresholds are configuration, not constants: quizzes and
//! vocabulary pass at 70% by default, interactive sessions at 60%.

use serde::{Deserialize, Serialize};

use crate::catalog::TaskSpec;

/// Scoring thresholds and weights, overridable via config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Completion threshold for quiz/vocabulary tasks, fraction of max score
    pub quiz_pass_fraction: f64,

    /// Completion threshold for interactive sessions, fraction of max score
    pub session_pass_fraction: f64,

    /// Ceiling on the time-efficiency bonus, in raw (pre-scale) points
    pub session_time_bonus_max: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { quiz_pass_fraction: 0.7, session_pass_fraction: 0.6, session_time_bonus_max: 10 }
    }
}

/// Raw answers for one attempt, as shaped by the request handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum AnswerSheet {
    /// Graded question set: quizzes, vocabulary checks, externally graded writing
    Quiz {
        /// Correctly answered questions
        correct: u32,
        /// Total questions asked
        total: u32,
    },
    /// Interactive session assessment, components on a 0-100 scale
    Session {
        pronunciation: u32,
        fluency: u32,
        grammar: u32,
        /// How long the session ran, in seconds
        duration_seconds: u32,
    },
    /// No grading data; the attempt is recorded but scores nothing
    Unscored,
}

/// Compute (score, completed) for one attempt
///
/// Total for any input: malformed answers (zero-question quiz, unscored
/// payloads) yield `(0, false)` rather than an error.
pub fn score_attempt(config: &ScoringConfig, spec: &TaskSpec, answers: &AnswerSheet) -> (u32, bool) {
    match answers {
        AnswerSheet::Quiz { correct, total } => {
            if *total == 0 {
                return (0, false);
            }
            let fraction = f64::from((*correct).min(*total)) / f64::from(*total);
            let score = (fraction * f64::from(spec.max_score)).floor() as u32;
            let completed = f64::from(score) >= config.quiz_pass_fraction * f64::from(spec.max_score);
            (score, completed)
        }
        AnswerSheet::Session { pronunciation, fluency, grammar, duration_seconds } => {
            let weighted = 0.5 * f64::from((*pronunciation).min(100))
                + 0.25 * f64::from((*fluency).min(100))
                + 0.25 * f64::from((*grammar).min(100));
            let bonus = time_bonus(config, spec.time_limit_seconds, *duration_seconds);
            let raw = weighted + f64::from(bonus);
            // Scale the 0-100 raw score to the task's range, then cap
            let score = ((raw / 100.0 * f64::from(spec.max_score)).floor() as u32)
                .min(spec.max_score);
            let completed =
                f64::from(score) >= config.session_pass_fraction * f64::from(spec.max_score);
            (score, completed)
        }
        AnswerSheet::Unscored => (0, false),
    }
}

/// Time-efficiency bonus: grows linearly as the session finishes earlier,
/// zero when there is no time limit or the limit was exceeded
fn time_bonus(config: &ScoringConfig, limit_seconds: Option<u32>, duration_seconds: u32) -> u32 {
    let Some(limit) = limit_seconds else {
        return 0;
    };
    if limit == 0 || duration_seconds >= limit {
        return 0;
    }
    let saved_fraction = f64::from(limit - duration_seconds) / f64::from(limit);
    (saved_fraction * f64::from(config.session_time_bonus_max)).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::model::TaskKind;

    fn quiz_spec() -> TaskSpec {
        TaskSpec { id: "k1".into(), kind: TaskKind::Quiz, max_score: 100, time_limit_seconds: None }
    }

    fn session_spec() -> TaskSpec {
        TaskSpec {
            id: "conv1".into(),
            kind: TaskKind::Conversation,
            max_score: 100,
            time_limit_seconds: Some(300),
        }
    }

    #[test]
    fn quiz_passing_score() {
        let config = ScoringConfig::default();
        let (score, completed) =
            score_attempt(&config, &quiz_spec(), &AnswerSheet::Quiz { correct: 8, total: 10 });
        assert_eq!(score, 80);
        assert!(completed);
    }

    #[test]
    fn quiz_below_threshold_is_not_completed() {
        let config = ScoringConfig::default();
        let (score, completed) =
            score_attempt(&config, &quiz_spec(), &AnswerSheet::Quiz { correct: 6, total: 10 });
        assert_eq!(score, 60);
        assert!(!completed);
    }

    #[test]
    fn quiz_exactly_at_threshold_completes() {
        let config = ScoringConfig::default();
        let (score, completed) =
            score_attempt(&config, &quiz_spec(), &AnswerSheet::Quiz { correct: 7, total: 10 });
        assert_eq!(score, 70);
        assert!(completed);
    }

    #[test]
    fn quiz_with_zero_questions_scores_zero() {
        let config = ScoringConfig::default();
        let (score, completed) =
            score_attempt(&config, &quiz_spec(), &AnswerSheet::Quiz { correct: 0, total: 0 });
        assert_eq!(score, 0);
        assert!(!completed);
    }

    #[test]
    fn quiz_score_scales_to_max_score() {
        let config = ScoringConfig::default();
        let spec = TaskSpec { max_score: 50, ..quiz_spec() };
        let (score, completed) =
            score_attempt(&config, &spec, &AnswerSheet::Quiz { correct: 9, total: 10 });
        assert_eq!(score, 45);
        assert!(completed);
    }

    #[test]
    fn session_weighted_components() {
        let config = ScoringConfig::default();
        // 0.5*80 + 0.25*60 + 0.25*70 = 72.5, no bonus (over the limit)
        let answers = AnswerSheet::Session {
            pronunciation: 80,
            fluency: 60,
            grammar: 70,
            duration_seconds: 400,
        };
        let (score, completed) = score_attempt(&config, &session_spec(), &answers);
        assert_eq!(score, 72);
        assert!(completed);
    }

    #[test]
    fn session_time_bonus_is_capped() {
        let config = ScoringConfig::default();
        // Perfect components + instant finish: raw 100 + 10, capped at max_score
        let answers = AnswerSheet::Session {
            pronunciation: 100,
            fluency: 100,
            grammar: 100,
            duration_seconds: 0,
        };
        let (score, completed) = score_attempt(&config, &session_spec(), &answers);
        assert_eq!(score, 100);
        assert!(completed);
    }

    #[test]
    fn session_bonus_grows_with_time_saved() {
        let config = ScoringConfig::default();
        assert_eq!(time_bonus(&config, Some(300), 300), 0);
        assert_eq!(time_bonus(&config, Some(300), 150), 5);
        assert_eq!(time_bonus(&config, Some(300), 0), 10);
        assert_eq!(time_bonus(&config, None, 10), 0);
    }

    #[test]
    fn session_below_threshold_is_not_completed() {
        let config = ScoringConfig::default();
        let answers = AnswerSheet::Session {
            pronunciation: 50,
            fluency: 50,
            grammar: 50,
            duration_seconds: 400,
        };
        let (score, completed) = score_attempt(&config, &session_spec(), &answers);
        assert_eq!(score, 50);
        assert!(!completed);
    }

    #[test]
    fn unscored_answers_never_fail() {
        let config = ScoringConfig::default();
        let (score, completed) = score_attempt(&config, &quiz_spec(), &AnswerSheet::Unscored);
        assert_eq!(score, 0);
        assert!(!completed);
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let config = ScoringConfig { quiz_pass_fraction: 0.9, ..Default::default() };
        let (_, completed) =
            score_attempt(&config, &quiz_spec(), &AnswerSheet::Quiz { correct: 8, total: 10 });
        assert!(!completed);
    }
}
