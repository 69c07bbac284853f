//! Read-only view DTOs
//!
//! Flat structures built by copying fields out of the aggregate. These
//! are what request handlers serialize; they expose no mutation.

use serde::Serialize;

use super::badges::BadgeProgress;
use super::model::{
    EnglishLevel, LearnedWord, LevelProgress, Rank, TaskKind, TaskProgress, TopicProgress,
    UserProgress,
};

/// Summary returned from a recorded attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptOutcome {
    /// Stored (monotonic max) score for the task after this attempt
    pub score: u32,
    /// Whether the task is completed after this attempt
    pub completed: bool,
    /// Aggregate total after roll-up
    pub total_points: u32,
    /// Rank after roll-up
    pub rank: Rank,
}

/// Whole-progress view
#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub user_id: String,
    pub english_level: EnglishLevel,
    pub total_points: u32,
    pub rank: Rank,
    pub last_activity_date: Option<i64>,
    pub topics: Vec<TopicProgressView>,
    pub learned_words: Vec<LearnedWord>,
}

/// Per-topic view
#[derive(Debug, Clone, Serialize)]
pub struct TopicProgressView {
    pub topic_id: String,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub earned_score: u32,
    pub current_level: u32,
    /// Learned words recorded against this topic
    pub words_learned: usize,
    pub levels: Vec<LevelProgressView>,
}

/// Per-level view
#[derive(Debug, Clone, Serialize)]
pub struct LevelProgressView {
    pub level_id: String,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub earned_score: u32,
    pub tasks: Vec<TaskProgressView>,
}

/// Per-task view
#[derive(Debug, Clone, Serialize)]
pub struct TaskProgressView {
    pub task_id: String,
    pub kind: TaskKind,
    pub completed: bool,
    pub score: u32,
    pub attempts: u32,
    pub last_attempt: Option<i64>,
}

/// Badge standing for a user
#[derive(Debug, Clone, Serialize)]
pub struct BadgeStatusView {
    pub user_id: String,
    pub total_points: u32,
    pub rank: Rank,
    pub badges: BadgeProgress,
}

impl ProgressView {
    /// Build the whole-progress view from an aggregate
    pub fn from_progress(progress: &UserProgress) -> Self {
        Self {
            user_id: progress.user_id.clone(),
            english_level: progress.english_level,
            total_points: progress.total_points,
            rank: progress.rank,
            last_activity_date: progress.last_activity_date,
            topics: progress
                .topics
                .values()
                .map(|t| TopicProgressView::from_topic(t, progress.learned_words_in_topic(&t.topic_id)))
                .collect(),
            learned_words: progress.learned_words.clone(),
        }
    }
}

impl TopicProgressView {
    /// Build a topic view; `words_learned` comes from the aggregate's word log
    pub fn from_topic(topic: &TopicProgress, words_learned: usize) -> Self {
        Self {
            topic_id: topic.topic_id.clone(),
            completed: topic.completed,
            completed_at: topic.completed_at,
            earned_score: topic.earned_score,
            current_level: topic.current_level,
            words_learned,
            levels: topic.levels.values().map(LevelProgressView::from_level).collect(),
        }
    }
}

impl LevelProgressView {
    fn from_level(level: &LevelProgress) -> Self {
        Self {
            level_id: level.level_id.clone(),
            completed: level.completed,
            completed_at: level.completed_at,
            earned_score: level.earned_score,
            tasks: level.tasks.values().map(TaskProgressView::from_task).collect(),
        }
    }
}

impl TaskProgressView {
    fn from_task(task: &TaskProgress) -> Self {
        Self {
            task_id: task.task_id.clone(),
            kind: task.kind,
            completed: task.completed,
            score: task.score,
            attempts: task.attempts,
            last_attempt: task.last_attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::model::TaskKind;

    #[test]
    fn view_copies_rollups_and_counts_words() {
        let mut progress = UserProgress::new("u1");
        progress.total_points = 80;
        let topic = progress.topic_mut("t1");
        topic.earned_score = 80;
        let level = topic.level_mut("l1");
        level.earned_score = 80;
        let task = level.task_mut("k1", TaskKind::Quiz);
        task.score = 80;
        task.attempts = 2;
        progress.learned_words.push(LearnedWord {
            word: "kibbutz".into(),
            topic_id: "t1".into(),
            flashcard_id: None,
            learned_at: 1,
        });

        let view = ProgressView::from_progress(&progress);
        assert_eq!(view.total_points, 80);
        assert_eq!(view.topics.len(), 1);
        assert_eq!(view.topics[0].words_learned, 1);
        assert_eq!(view.topics[0].levels[0].tasks[0].score, 80);
        assert_eq!(view.learned_words.len(), 1);
    }

    #[test]
    fn views_serialize_without_internal_fields() {
        let progress = UserProgress::new("u1");
        let view = ProgressView::from_progress(&progress);
        let json = serde_json::to_string(&view).unwrap();
        // The optimistic-concurrency counter stays internal
        assert!(!json.contains("version"));
    }
}
