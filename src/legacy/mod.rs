//! Backward-compatibility mirror for the legacy per-topic progress rows
//!
//! Older readers expect one row per (user, topic) with the old field
//! names. The core emits a `TopicCompleted` event when a topic first
//! completes and this module translates it into that shape. Strictly
//! one-way: nothing in the core ever reads the mirrored rows, and the
//! whole module can be deleted once the legacy readers are gone.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Emitted once per topic, on the attempt that completes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCompleted {
    pub user_id: String,
    pub topic_id: String,
    pub earned_score: u32,
    pub completed_at: i64,
}

/// Sink for topic-completion events
pub trait LegacyMirror {
    /// Record a completion in the legacy representation
    fn topic_completed(&self, event: &TopicCompleted) -> Result<()>;
}

/// One row in the legacy collection, with its original field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTopicRow {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "topicId")]
    pub topic_id: String,
    #[serde(rename = "totalScore")]
    pub total_score: u32,
    #[serde(rename = "IsCompleted")]
    pub is_completed: bool,
    #[serde(rename = "completedDate")]
    pub completed_date: i64,
}

impl LegacyTopicRow {
    fn from_event(event: &TopicCompleted) -> Self {
        Self {
            user_id: event.user_id.clone(),
            topic_id: event.topic_id.clone(),
            total_score: event.earned_score,
            is_completed: true,
            completed_date: event.completed_at,
        }
    }
}

/// File-backed mirror: a single JSON list of legacy rows
#[derive(Debug)]
pub struct JsonLegacyMirror {
    path: PathBuf,
}

impl JsonLegacyMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_rows(&self) -> Result<Vec<LegacyTopicRow>> {
        if self.path.exists() {
            let contents = std::fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read legacy rows from {:?}", self.path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse legacy rows")
        } else {
            Ok(Vec::new())
        }
    }

    fn save_rows(&self, rows: &[LegacyTopicRow]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create mirror directory {:?}", parent))?;
        }
        let contents =
            serde_json::to_string_pretty(rows).with_context(|| "Failed to serialize legacy rows")?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write legacy rows to {:?}", self.path))?;
        Ok(())
    }
}

impl LegacyMirror for JsonLegacyMirror {
    fn topic_completed(&self, event: &TopicCompleted) -> Result<()> {
        let mut rows = self.load_rows()?;
        let row = LegacyTopicRow::from_event(event);
        if let Some(existing) = rows
            .iter_mut()
            .find(|r| r.user_id == row.user_id && r.topic_id == row.topic_id)
        {
            *existing = row;
        } else {
            rows.push(row);
        }
        self.save_rows(&rows)?;
        debug!(user = %event.user_id, topic = %event.topic_id, "mirrored topic completion");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn event(user: &str, topic: &str, score: u32) -> TopicCompleted {
        TopicCompleted {
            user_id: user.into(),
            topic_id: topic.into(),
            earned_score: score,
            completed_at: 1000,
        }
    }

    #[test]
    fn mirror_appends_legacy_row() {
        let dir = TempDir::new().unwrap();
        let mirror = JsonLegacyMirror::new(dir.path().join("legacy.json"));

        mirror.topic_completed(&event("u1", "t1", 80)).unwrap();
        let rows = mirror.load_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_score, 80);
        assert!(rows[0].is_completed);
    }

    #[test]
    fn mirror_upserts_on_repeat_completion() {
        let dir = TempDir::new().unwrap();
        let mirror = JsonLegacyMirror::new(dir.path().join("legacy.json"));

        mirror.topic_completed(&event("u1", "t1", 80)).unwrap();
        mirror.topic_completed(&event("u1", "t1", 95)).unwrap();
        mirror.topic_completed(&event("u1", "t2", 40)).unwrap();

        let rows = mirror.load_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total_score, 95);
    }

    #[test]
    fn rows_use_legacy_field_names() {
        let row = LegacyTopicRow::from_event(&event("u1", "t1", 80));
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("userId"));
        assert!(json.contains("topicId"));
        assert!(json.contains("IsCompleted"));
        assert!(json.contains("completedDate"));
    }
}
