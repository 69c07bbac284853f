//! Use-case orchestration over the store, ledger and badge tables
//!
//! Each use case is one read-modify-write cycle against a single user's
//! aggregate. Catalog validation happens before any mutation, and a save
//! that loses an optimistic race is retried against freshly read state a
//! bounded number of times before the conflict is surfaced.

use std::time::SystemTime;

use tracing::{info, warn};

use super::badges::{BadgeProgress, BadgeTier, RankTier, badge_progress};
use super::ledger::{self, AttemptRecord};
use super::model::{EnglishLevel, LearnedWord, TaskPayload, TopicProgress, UserProgress};
use super::scoring::{AnswerSheet, ScoringConfig, score_attempt};
use super::store::ProgressStore;
use super::views::{AttemptOutcome, BadgeStatusView, ProgressView, TopicProgressView};
use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::error::{ProgressError, Result};
use crate::legacy::{LegacyMirror, TopicCompleted};

/// How many times a lost optimistic race is retried before surfacing
const CONFLICT_RETRIES: u32 = 2;

/// The progress core's service facade
pub struct ProgressService<S> {
    store: S,
    catalog: Catalog,
    scoring: ScoringConfig,
    badge_tiers: Vec<BadgeTier>,
    rank_tiers: Vec<RankTier>,
    mirror: Option<Box<dyn LegacyMirror>>,
}

impl<S: ProgressStore> ProgressService<S> {
    /// Build a service from a store, catalog and configuration tables
    pub fn new(store: S, catalog: Catalog, config: &AppConfig) -> Self {
        Self {
            store,
            catalog,
            scoring: config.scoring.clone(),
            badge_tiers: config.badge_tiers.clone(),
            rank_tiers: config.rank_tiers.clone(),
            mirror: None,
        }
    }

    /// Attach a legacy mirror; completions will be echoed into it
    pub fn with_mirror(mut self, mirror: Box<dyn LegacyMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Create a zeroed aggregate for a user
    ///
    /// With `seed_topics`, one zero-progress entry per catalog topic is
    /// included. Fails with `AlreadyInitialized` when a document exists;
    /// callers may treat that as idempotent success.
    pub fn initialize_progress(&self, user_id: &str, seed_topics: bool) -> Result<ProgressView> {
        if self.store.get(user_id)?.is_some() {
            return Err(ProgressError::AlreadyInitialized(user_id.to_string()));
        }

        let mut progress = UserProgress::new(user_id);
        if seed_topics {
            for topic_id in self.catalog.topic_ids() {
                progress
                    .topics
                    .insert(topic_id.clone(), TopicProgress { topic_id, ..Default::default() });
            }
        }

        match self.store.save(&mut progress) {
            Ok(()) => {
                info!(user = %user_id, "progress initialized");
                Ok(ProgressView::from_progress(&progress))
            }
            // Someone else created the document between our check and write
            Err(ProgressError::ConcurrentUpdateConflict { .. }) => {
                Err(ProgressError::AlreadyInitialized(user_id.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// Record one task attempt and return the post-roll-up summary
    pub fn submit_task_attempt(
        &self,
        user_id: &str,
        topic_id: &str,
        level_id: &str,
        task_id: &str,
        answers: &AnswerSheet,
        payload: TaskPayload,
    ) -> Result<AttemptOutcome> {
        // Reject bad references before any state is touched
        let resolved = self.catalog.resolve(topic_id, level_id, task_id)?;
        let (score, completed) = score_attempt(&self.scoring, resolved.task, answers);
        let attempt = AttemptRecord {
            topic_id: topic_id.to_string(),
            level_id: level_id.to_string(),
            task_id: task_id.to_string(),
            kind: resolved.task.kind,
            level_number: resolved.level.number,
            score,
            completed,
            tasks_in_level: resolved.level.tasks.len() as u32,
            levels_in_topic: resolved.topic.levels.len() as u32,
            payload,
        };
        let now = now_unix();

        let mut tries = 0;
        loop {
            let mut progress = self.store.get_or_create(user_id)?;
            let topic_was_completed =
                progress.topics.get(topic_id).is_some_and(|t| t.completed);

            ledger::record_task_attempt(&mut progress, &attempt, &self.rank_tiers, now)?;

            match self.store.save(&mut progress) {
                Ok(()) => {
                    let topic = &progress.topics[topic_id];
                    if topic.completed && !topic_was_completed {
                        self.emit_topic_completed(user_id, topic);
                    }
                    let task = &topic.levels[level_id].tasks[task_id];
                    return Ok(AttemptOutcome {
                        score: task.score,
                        completed: task.completed,
                        total_points: progress.total_points,
                        rank: progress.rank,
                    });
                }
                Err(ProgressError::ConcurrentUpdateConflict { .. }) if tries < CONFLICT_RETRIES => {
                    tries += 1;
                    warn!(user = %user_id, tries, "attempt save lost a race, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Record a learned word; a repeat call for the same word is a no-op
    pub fn mark_word_learned(
        &self,
        user_id: &str,
        word: &str,
        topic_id: &str,
        flashcard_id: Option<String>,
    ) -> Result<()> {
        if self.catalog.topic(topic_id).is_none() {
            return Err(ProgressError::InvalidReference(format!("unknown topic {topic_id}")));
        }
        let entry = LearnedWord {
            word: word.to_string(),
            topic_id: topic_id.to_string(),
            flashcard_id,
            learned_at: now_unix(),
        };

        let mut tries = 0;
        loop {
            let mut progress = self.store.get_or_create(user_id)?;
            if !ledger::record_learned_word(&mut progress, entry.clone())? {
                // Already learned; nothing to persist
                return Ok(());
            }
            // Learning a word is a first touch of the topic, so its node
            // must exist for topic views and word counts
            progress.topic_mut(topic_id);
            match self.store.save(&mut progress) {
                Ok(()) => return Ok(()),
                Err(ProgressError::ConcurrentUpdateConflict { .. }) if tries < CONFLICT_RETRIES => {
                    tries += 1;
                    warn!(user = %user_id, tries, "word save lost a race, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Update the informational English level
    pub fn set_english_level(&self, user_id: &str, level: EnglishLevel) -> Result<()> {
        self.update(user_id, |progress| {
            progress.english_level = level;
            progress.last_activity_date = Some(now_unix());
            Ok(())
        })
    }

    /// Recompute every derived field from the leaf values
    ///
    /// Repair entry point for documents whose roll-ups drifted (legacy
    /// imports, manual edits). Leaf data is never touched.
    pub fn repair_progress(&self, user_id: &str) -> Result<ProgressView> {
        self.update(user_id, |progress| {
            ledger::recompute_rollups(progress, &self.rank_tiers);
            Ok(())
        })?;
        self.get_progress(user_id)
    }

    /// Whole-progress view
    pub fn get_progress(&self, user_id: &str) -> Result<ProgressView> {
        let progress = self.require(user_id)?;
        Ok(ProgressView::from_progress(&progress))
    }

    /// Single-topic view
    pub fn get_topic_progress(&self, user_id: &str, topic_id: &str) -> Result<TopicProgressView> {
        let progress = self.require(user_id)?;
        let topic = progress.topics.get(topic_id).ok_or_else(|| {
            ProgressError::NotFound(format!("topic {topic_id} for user {user_id}"))
        })?;
        Ok(TopicProgressView::from_topic(topic, progress.learned_words_in_topic(topic_id)))
    }

    /// Badge standing derived from the stored point total
    pub fn get_badge_status(&self, user_id: &str) -> Result<BadgeStatusView> {
        let progress = self.require(user_id)?;
        Ok(BadgeStatusView {
            user_id: progress.user_id.clone(),
            total_points: progress.total_points,
            rank: progress.rank,
            badges: self.badge_progress_for(progress.total_points),
        })
    }

    /// Badge standing for an arbitrary point total, using this service's table
    pub fn badge_progress_for(&self, total_points: u32) -> BadgeProgress {
        badge_progress(&self.badge_tiers, total_points)
    }

    fn require(&self, user_id: &str) -> Result<UserProgress> {
        self.store.get(user_id)?.ok_or_else(|| ProgressError::NotFound(format!("user {user_id}")))
    }

    /// Generic retried read-modify-write against an existing aggregate
    fn update(&self, user_id: &str, apply: impl Fn(&mut UserProgress) -> Result<()>) -> Result<()> {
        let mut tries = 0;
        loop {
            let mut progress = self.require(user_id)?;
            apply(&mut progress)?;
            match self.store.save(&mut progress) {
                Ok(()) => return Ok(()),
                Err(ProgressError::ConcurrentUpdateConflict { .. }) if tries < CONFLICT_RETRIES => {
                    tries += 1;
                    warn!(user = %user_id, tries, "update lost a race, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Mirror failures are logged, never surfaced: the mirror is optional
    /// compatibility code and must not fail a recorded attempt
    fn emit_topic_completed(&self, user_id: &str, topic: &TopicProgress) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        let event = TopicCompleted {
            user_id: user_id.to_string(),
            topic_id: topic.topic_id.clone(),
            earned_score: topic.earned_score,
            completed_at: topic.completed_at.unwrap_or_else(now_unix),
        };
        if let Err(err) = mirror.topic_completed(&event) {
            warn!(user = %user_id, topic = %topic.topic_id, %err, "legacy mirror write failed");
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}
