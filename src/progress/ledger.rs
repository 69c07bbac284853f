//! Pure roll-up transitions over a progress aggregate
//!
//! Every function here mutates an in-memory `UserProgress` and nothing
//! else: no I/O, no clock (the caller passes `now`). Derived fields are
//! recomputed bottom-up after each change so the roll-up equalities hold
//! on exit:
//!
//! - `level.earned_score == sum(task.score)`
//! - `topic.earned_score == sum(level.earned_score)`
//! - `total_points == sum(topic.earned_score)`
//!
//! Completion is monotonic at every layer: a task never un-completes, so
//! the derived level/topic flags never regress either.
//!
//! Nodes are created lazily, so a level may hold fewer task entries than
//! the catalog defines for it. Each attempt stamps the catalog's task and
//! level counts onto the touched nodes (`total_tasks`, `total_levels`);
//! a level or topic only completes once that many children exist and all
//! of them are completed.

use tracing::debug;

use super::badges::{RankTier, rank_for_points};
use super::model::{LevelProgress, TaskKind, TaskPayload, TopicProgress, UserProgress};
use crate::error::{ProgressError, Result};

/// One validated attempt, ready to be folded into the aggregate
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub topic_id: String,
    pub level_id: String,
    pub task_id: String,
    pub kind: TaskKind,
    /// Level number from the catalog, drives `current_level`
    pub level_number: u32,
    /// Score for this attempt; the stored score is the running max
    pub score: u32,
    /// Whether this attempt met the completion threshold
    pub completed: bool,
    /// How many tasks the catalog defines for this level
    pub tasks_in_level: u32,
    /// How many levels the catalog defines for this topic
    pub levels_in_topic: u32,
    /// Type-specific data to merge into the task
    pub payload: TaskPayload,
}

/// Fold one task attempt into the aggregate
///
/// Locates or creates the topic/level/task nodes, applies the monotonic
/// score/completion rules, then recomputes every derived field up the
/// tree. Re-submitting an already-completed task is an ordinary attempt
/// that can only hold or raise the stored score.
pub fn record_task_attempt(
    progress: &mut UserProgress,
    attempt: &AttemptRecord,
    rank_tiers: &[RankTier],
    now: i64,
) -> Result<()> {
    if attempt.topic_id.is_empty() || attempt.level_id.is_empty() || attempt.task_id.is_empty() {
        return Err(ProgressError::InvariantViolation(
            "attempt with empty topic/level/task id".into(),
        ));
    }

    let topic = progress.topic_mut(&attempt.topic_id);
    topic.current_level = topic.current_level.max(attempt.level_number);
    topic.total_levels = topic.total_levels.max(attempt.levels_in_topic);

    let level = topic.level_mut(&attempt.level_id);
    level.total_tasks = level.total_tasks.max(attempt.tasks_in_level);
    let task = level.task_mut(&attempt.task_id, attempt.kind);

    task.score = task.score.max(attempt.score);
    task.attempts += 1;
    task.last_attempt = Some(now);
    task.payload.merge(&attempt.payload);
    if attempt.completed && !task.completed {
        task.completed = true;
        task.completed_at = Some(now);
        debug!(task = %attempt.task_id, "task completed");
    }

    roll_up_level(level, now);
    roll_up_topic(topic, now);
    roll_up_totals(progress, rank_tiers);
    progress.last_activity_date = Some(now);

    Ok(())
}

/// Append a learned word if it is not already present
///
/// Idempotent: a duplicate (by flashcard id, or by word+topic) leaves the
/// aggregate untouched, including `last_activity_date`. Returns whether a
/// new entry was added.
pub fn record_learned_word(
    progress: &mut UserProgress,
    entry: super::model::LearnedWord,
) -> Result<bool> {
    if entry.word.is_empty() || entry.topic_id.is_empty() {
        return Err(ProgressError::InvariantViolation("learned word with empty word/topic".into()));
    }

    if progress.learned_words.iter().any(|w| w.same_word(&entry)) {
        return Ok(false);
    }

    progress.last_activity_date = Some(entry.learned_at);
    progress.learned_words.push(entry);
    Ok(true)
}

/// Recompute every derived field from the leaf task values
///
/// Repairs `earned_score`, `completed`, `total_points` and `rank` without
/// touching `attempts`, `last_attempt`, `completed_at`, payloads, or
/// timestamps. Completion stays monotonic here too: repair can set a flag
/// the scores justify but never clears one. Used for validating
/// invariants and fixing drifted documents.
pub fn recompute_rollups(progress: &mut UserProgress, rank_tiers: &[RankTier]) {
    for topic in progress.topics.values_mut() {
        for level in topic.levels.values_mut() {
            level.earned_score = level.tasks.values().map(|t| t.score).sum();
            if level_complete(level) {
                level.completed = true;
            }
        }
        topic.earned_score = topic.levels.values().map(|l| l.earned_score).sum();
        if topic_complete(topic) {
            topic.completed = true;
        }
    }
    roll_up_totals(progress, rank_tiers);
}

/// Every task done, and as many tasks present as the catalog defines
fn level_complete(level: &LevelProgress) -> bool {
    !level.tasks.is_empty()
        && level.tasks.len() as u32 >= level.total_tasks
        && level.tasks.values().all(|t| t.completed)
}

fn topic_complete(topic: &TopicProgress) -> bool {
    !topic.levels.is_empty()
        && topic.levels.len() as u32 >= topic.total_levels
        && topic.levels.values().all(|l| l.completed)
}

fn roll_up_level(level: &mut LevelProgress, now: i64) {
    level.earned_score = level.tasks.values().map(|t| t.score).sum();
    if !level.completed && level_complete(level) {
        level.completed = true;
        level.completed_at = Some(now);
    }
}

fn roll_up_topic(topic: &mut TopicProgress, now: i64) {
    topic.earned_score = topic.levels.values().map(|l| l.earned_score).sum();
    if !topic.completed && topic_complete(topic) {
        topic.completed = true;
        topic.completed_at = Some(now);
    }
}

fn roll_up_totals(progress: &mut UserProgress, rank_tiers: &[RankTier]) {
    progress.total_points = progress.topics.values().map(|t| t.earned_score).sum();
    progress.rank = rank_for_points(rank_tiers, progress.total_points);
}
