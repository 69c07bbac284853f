//! The canonical per-user progress aggregate
//!
//! One `UserProgress` document per user is the single consistency boundary.
//! Every derived field (`earned_score`, `total_points`, `completed` flags)
//! is recomputed bottom-up by the ledger; callers never set them directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Self-reported English level, informational only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnglishLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// Coarse tier derived from total points via the configured threshold table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Master,
}

/// Kind of learning task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Vocabulary flashcards
    #[default]
    Words,
    Quiz,
    Writing,
    Conversation,
    Post,
}

/// Type-specific attempt data, opaque to the roll-up logic
///
/// Every field has a defined default so presence checks are never needed.
/// Merging is last-write-wins per field: an attempt that carries a field
/// overwrites it, an attempt that doesn't leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Words covered by a vocabulary attempt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words_learned: Vec<String>,

    /// Submitted text for writing tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Feedback attached to a writing attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,

    /// Conversation session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// Conversation duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

impl TaskPayload {
    /// Merge another payload into this one, last write wins per field
    pub fn merge(&mut self, other: &TaskPayload) {
        if !other.words_learned.is_empty() {
            self.words_learned = other.words_learned.clone();
        }
        if other.response.is_some() {
            self.response = other.response.clone();
        }
        if other.feedback.is_some() {
            self.feedback = other.feedback.clone();
        }
        if other.conversation_id.is_some() {
            self.conversation_id = other.conversation_id.clone();
        }
        if other.duration_seconds.is_some() {
            self.duration_seconds = other.duration_seconds;
        }
    }
}

/// Progress on a single task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Task identifier, unique within the level
    pub task_id: String,

    /// Task kind
    pub kind: TaskKind,

    /// Monotonic: once true, never flips back
    pub completed: bool,

    /// Set once, on the attempt that first completes the task
    pub completed_at: Option<i64>,

    /// Highest score ever achieved on this task
    pub score: u32,

    /// Total recorded attempts, never reset
    pub attempts: u32,

    /// Unix timestamp of the most recent attempt
    pub last_attempt: Option<i64>,

    /// Type-specific attempt data
    #[serde(default)]
    pub payload: TaskPayload,
}

/// Progress on a single level within a topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Level identifier, unique within the topic
    pub level_id: String,

    /// True iff every task is completed and there is at least one task
    pub completed: bool,

    /// Set once on the first transition to completed
    pub completed_at: Option<i64>,

    /// Derived: sum of task scores
    pub earned_score: u32,

    /// How many tasks the catalog defines for this level, stamped on
    /// first touch; completion requires this many task entries
    #[serde(default)]
    pub total_tasks: u32,

    /// Per-task progress, keyed by task id
    pub tasks: BTreeMap<String, TaskProgress>,
}

impl LevelProgress {
    /// Get or create task progress with zeroed defaults
    pub fn task_mut(&mut self, task_id: &str, kind: TaskKind) -> &mut TaskProgress {
        self.tasks.entry(task_id.to_string()).or_insert_with(|| TaskProgress {
            task_id: task_id.to_string(),
            kind,
            ..Default::default()
        })
    }
}

/// Progress on a single topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicProgress {
    /// Topic identifier from the catalog
    pub topic_id: String,

    /// True iff every level is completed and there is at least one level
    pub completed: bool,

    /// Set once on the first transition to completed
    pub completed_at: Option<i64>,

    /// Derived: sum of level scores
    pub earned_score: u32,

    /// Highest level number started, never decreases
    pub current_level: u32,

    /// How many levels the catalog defines for this topic, stamped on
    /// first touch; completion requires this many level entries
    #[serde(default)]
    pub total_levels: u32,

    /// Per-level progress, keyed by level id
    pub levels: BTreeMap<String, LevelProgress>,
}

impl TopicProgress {
    /// Get or create level progress with zeroed defaults
    pub fn level_mut(&mut self, level_id: &str) -> &mut LevelProgress {
        self.levels.entry(level_id.to_string()).or_insert_with(|| LevelProgress {
            level_id: level_id.to_string(),
            ..Default::default()
        })
    }
}

/// A vocabulary word the user has marked as learned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedWord {
    /// The word itself
    pub word: String,

    /// Topic the word belongs to
    pub topic_id: String,

    /// Stable flashcard identifier, when the content service supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flashcard_id: Option<String>,

    /// Unix timestamp of when the word was learned
    pub learned_at: i64,
}

impl LearnedWord {
    /// True when `other` refers to the same learned word
    ///
    /// Dedup key is the flashcard id when both sides carry one, otherwise
    /// the (word, topic) pair.
    pub fn same_word(&self, other: &LearnedWord) -> bool {
        match (&self.flashcard_id, &other.flashcard_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.word == other.word && self.topic_id == other.topic_id,
        }
    }
}

/// The root progress aggregate, one per user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    /// Opaque user identifier, unique key
    pub user_id: String,

    /// Self-reported English level
    #[serde(default)]
    pub english_level: EnglishLevel,

    /// Derived: sum of all topic scores
    pub total_points: u32,

    /// Derived from total points via the rank table
    #[serde(default)]
    pub rank: Rank,

    /// Unix timestamp of the last mutating operation
    pub last_activity_date: Option<i64>,

    /// Optimistic-concurrency counter, owned by the store layer
    #[serde(default)]
    pub version: u64,

    /// Per-topic progress, keyed by topic id
    pub topics: BTreeMap<String, TopicProgress>,

    /// Append-only learned-word log, deduplicated on insert
    pub learned_words: Vec<LearnedWord>,
}

impl UserProgress {
    /// Create a zeroed aggregate for a user
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), ..Default::default() }
    }

    /// Get or create topic progress with zeroed defaults
    pub fn topic_mut(&mut self, topic_id: &str) -> &mut TopicProgress {
        self.topics.entry(topic_id.to_string()).or_insert_with(|| TopicProgress {
            topic_id: topic_id.to_string(),
            ..Default::default()
        })
    }

    /// Count learned words for one topic
    pub fn learned_words_in_topic(&self, topic_id: &str) -> usize {
        self.learned_words.iter().filter(|w| w.topic_id == topic_id).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_aggregate_is_zeroed() {
        let progress = UserProgress::new("u1");
        assert_eq!(progress.user_id, "u1");
        assert_eq!(progress.total_points, 0);
        assert_eq!(progress.rank, Rank::Beginner);
        assert!(progress.topics.is_empty());
        assert!(progress.learned_words.is_empty());
    }

    #[test]
    fn topic_mut_creates_entry_if_missing() {
        let mut progress = UserProgress::new("u1");
        let topic = progress.topic_mut("israel-geography");
        assert_eq!(topic.topic_id, "israel-geography");
        assert!(progress.topics.contains_key("israel-geography"));
    }

    #[test]
    fn task_mut_uses_zeroed_defaults() {
        let mut level = LevelProgress { level_id: "l1".into(), ..Default::default() };
        let task = level.task_mut("k1", TaskKind::Quiz);
        assert_eq!(task.score, 0);
        assert_eq!(task.attempts, 0);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn payload_merge_is_last_write_wins_per_field() {
        let mut payload = TaskPayload {
            response: Some("first draft".into()),
            feedback: Some("ok".into()),
            ..Default::default()
        };
        payload.merge(&TaskPayload { response: Some("second draft".into()), ..Default::default() });

        assert_eq!(payload.response.as_deref(), Some("second draft"));
        // Untouched field survives the merge
        assert_eq!(payload.feedback.as_deref(), Some("ok"));
    }

    #[test]
    fn learned_word_dedup_prefers_flashcard_id() {
        let a = LearnedWord {
            word: "falafel".into(),
            topic_id: "t1".into(),
            flashcard_id: Some("fc-9".into()),
            learned_at: 0,
        };
        let b = LearnedWord {
            word: "shakshuka".into(),
            topic_id: "t2".into(),
            flashcard_id: Some("fc-9".into()),
            learned_at: 5,
        };
        assert!(a.same_word(&b));

        let c = LearnedWord {
            word: "falafel".into(),
            topic_id: "t1".into(),
            flashcard_id: None,
            learned_at: 0,
        };
        assert!(a.same_word(&c));
    }

    #[test]
    fn aggregate_round_trips_through_json() {
        let mut progress = UserProgress::new("u1");
        let topic = progress.topic_mut("t1");
        topic.current_level = 2;
        let level = topic.level_mut("l1");
        let task = level.task_mut("k1", TaskKind::Quiz);
        task.score = 80;
        task.attempts = 1;

        let json = serde_json::to_string(&progress).unwrap();
        let back: UserProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, progress);
    }
}
