//! Read-only topic/level/task catalog
//!
//! Reference data the progress core validates submissions against. The
//! catalog is owned elsewhere (content pipeline); this module only loads
//! and queries it.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ProgressError;
use crate::progress::model::TaskKind;

/// Specification of one task within a level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Task identifier, unique within the level
    pub id: String,

    /// Task kind, drives the scoring rule
    pub kind: TaskKind,

    /// Maximum achievable score
    pub max_score: u32,

    /// Allotted time in seconds, when the task is timed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<u32>,
}

/// One level within a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Level identifier, unique within the topic
    pub id: String,

    /// Level number (1-indexed, for ordering and `current_level`)
    pub number: u32,

    /// Tasks in presentation order
    pub tasks: Vec<TaskSpec>,
}

/// One topic in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Levels in ascending order
    pub levels: Vec<Level>,
}

/// The full catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// All topics
    pub topics: Vec<Topic>,
}

impl Catalog {
    /// Load a catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog from {:?}", path))?;
        serde_json::from_str(&contents).with_context(|| "Failed to parse catalog JSON")
    }

    /// Find a topic by id
    pub fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    /// All topic ids, in catalog order
    pub fn topic_ids(&self) -> Vec<String> {
        self.topics.iter().map(|t| t.id.clone()).collect()
    }

    /// Find a level within a topic
    pub fn level(&self, topic_id: &str, level_id: &str) -> Option<&Level> {
        self.topic(topic_id).and_then(|t| t.levels.iter().find(|l| l.id == level_id))
    }

    /// Resolve a (topic, level, task) triple, rejecting any missing link
    ///
    /// Called by the service before any mutation so a bad reference never
    /// produces a partial write.
    pub fn resolve(
        &self,
        topic_id: &str,
        level_id: &str,
        task_id: &str,
    ) -> Result<ResolvedTask<'_>, ProgressError> {
        let topic = self
            .topic(topic_id)
            .ok_or_else(|| ProgressError::InvalidReference(format!("unknown topic {topic_id}")))?;
        let level = topic.levels.iter().find(|l| l.id == level_id).ok_or_else(|| {
            ProgressError::InvalidReference(format!("unknown level {level_id} in topic {topic_id}"))
        })?;
        let task = level.tasks.iter().find(|t| t.id == task_id).ok_or_else(|| {
            ProgressError::InvalidReference(format!("unknown task {task_id} in level {level_id}"))
        })?;
        Ok(ResolvedTask { topic, level, task })
    }
}

/// A validated (topic, level, task) triple
#[derive(Debug, Clone, Copy)]
pub struct ResolvedTask<'a> {
    pub topic: &'a Topic,
    pub level: &'a Level,
    pub task: &'a TaskSpec,
}

#[cfg(test)]
pub(crate) fn sample_catalog() -> Catalog {
    Catalog {
        topics: vec![
            Topic {
                id: "t1".into(),
                name: "Geography".into(),
                levels: vec![Level {
                    id: "l1".into(),
                    number: 1,
                    tasks: vec![
                        TaskSpec {
                            id: "k1".into(),
                            kind: TaskKind::Quiz,
                            max_score: 100,
                            time_limit_seconds: None,
                        },
                        TaskSpec {
                            id: "k2".into(),
                            kind: TaskKind::Words,
                            max_score: 100,
                            time_limit_seconds: None,
                        },
                    ],
                }],
            },
            Topic {
                id: "t2".into(),
                name: "Food".into(),
                levels: vec![Level {
                    id: "l1".into(),
                    number: 1,
                    tasks: vec![TaskSpec {
                        id: "conv1".into(),
                        kind: TaskKind::Conversation,
                        max_score: 100,
                        time_limit_seconds: Some(300),
                    }],
                }],
            },
        ],
    }
}
