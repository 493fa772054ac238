//! Storage traits and the in-memory reference implementation
//!
//! The canary controller, selector, and trainer all run against these
//! traits so they can be exercised without a database. The Postgres
//! implementation lives in `db`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::models::{PromptRecord, PromptStatus, RawTask};

/// Reject traffic fractions outside [0, 1] before they reach storage.
pub fn validate_traffic(traffic: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&traffic) {
        bail!("Traffic must be within [0.0, 1.0], got {}", traffic);
    }
    Ok(())
}

/// Fold one feedback score into a prompt's running average.
///
/// The first score sets the average directly; afterwards the average is
/// weighted by the interaction count at the time of the update.
pub fn fold_feedback(
    old_avg: Option<f64>,
    old_count: i64,
    score: f64,
) -> f64 {
    match old_avg {
        None => score,
        Some(avg) => (avg * old_count as f64 + score) / (old_count as f64 + 1.0),
    }
}

/// Prompt registry operations.
///
/// Implementations must enforce that at most one prompt is `active` and
/// at most one is `candidate` at any time; that uniqueness is the only
/// concurrency safety net the rest of the crate relies on.
#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn get_active_prompt(&self) -> Result<Option<PromptRecord>>;
    async fn get_candidate_prompt(&self) -> Result<Option<PromptRecord>>;
    /// Insert a prompt, returning its new id. Fails on out-of-range
    /// traffic or on a status-uniqueness violation.
    async fn insert_prompt(&self, text: &str, status: PromptStatus, traffic: f64) -> Result<i32>;
    async fn update_prompt_traffic(&self, id: i32, traffic: f64) -> Result<()>;
    async fn update_prompt_status(&self, id: i32, status: PromptStatus) -> Result<()>;
    /// Set traffic to zero on every prompt not in `keep`.
    async fn zero_out_all_except(&self, keep: &[i32]) -> Result<()>;
    /// Count one interaction and optionally fold in a feedback score.
    async fn update_prompt_metrics(&self, id: i32, feedback_score: Option<f64>) -> Result<()>;
}

/// Read side for historical task data.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Recent tasks joined with optional feedback, newest first.
    async fn fetch_tasks_with_feedback(&self, limit: i64) -> Result<Vec<RawTask>>;
}

/// In-memory store used by tests and local experimentation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    prompts: Vec<PromptRecord>,
    tasks: Vec<RawTask>,
    next_id: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a task row for pipeline tests.
    pub fn push_task(&self, task: RawTask) {
        self.inner.lock().unwrap().tasks.push(task);
    }

    pub fn get_prompt(&self, id: i32) -> Option<PromptRecord> {
        self.inner
            .lock()
            .unwrap()
            .prompts
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn all_prompts(&self) -> Vec<PromptRecord> {
        self.inner.lock().unwrap().prompts.clone()
    }

    fn find_by_status(&self, status: PromptStatus) -> Option<PromptRecord> {
        self.inner
            .lock()
            .unwrap()
            .prompts
            .iter()
            .find(|p| p.status == status)
            .cloned()
    }
}

#[async_trait]
impl PromptStore for MemoryStore {
    async fn get_active_prompt(&self) -> Result<Option<PromptRecord>> {
        Ok(self.find_by_status(PromptStatus::Active))
    }

    async fn get_candidate_prompt(&self) -> Result<Option<PromptRecord>> {
        Ok(self.find_by_status(PromptStatus::Candidate))
    }

    async fn insert_prompt(&self, text: &str, status: PromptStatus, traffic: f64) -> Result<i32> {
        validate_traffic(traffic)?;
        let mut inner = self.inner.lock().unwrap();

        if matches!(status, PromptStatus::Active | PromptStatus::Candidate)
            && inner.prompts.iter().any(|p| p.status == status)
        {
            bail!("A prompt with status '{}' already exists", status.as_str());
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.prompts.push(PromptRecord {
            id,
            prompt_text: text.to_string(),
            status,
            traffic,
            num_interactions: 0,
            average_feedback_score: None,
        });
        Ok(id)
    }

    async fn update_prompt_traffic(&self, id: i32, traffic: f64) -> Result<()> {
        validate_traffic(traffic)?;
        let mut inner = self.inner.lock().unwrap();
        let prompt = inner
            .prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow::anyhow!("No prompt with id {}", id))?;
        prompt.traffic = traffic;
        Ok(())
    }

    async fn update_prompt_status(&self, id: i32, status: PromptStatus) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        if matches!(status, PromptStatus::Active | PromptStatus::Candidate)
            && inner.prompts.iter().any(|p| p.status == status && p.id != id)
        {
            bail!("A prompt with status '{}' already exists", status.as_str());
        }

        let prompt = inner
            .prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow::anyhow!("No prompt with id {}", id))?;
        prompt.status = status;
        Ok(())
    }

    async fn zero_out_all_except(&self, keep: &[i32]) -> Result<()> {
        let keep: HashSet<i32> = keep.iter().copied().collect();
        let mut inner = self.inner.lock().unwrap();
        for prompt in inner.prompts.iter_mut() {
            if !keep.contains(&prompt.id) {
                prompt.traffic = 0.0;
            }
        }
        Ok(())
    }

    async fn update_prompt_metrics(&self, id: i32, feedback_score: Option<f64>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let prompt = inner
            .prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow::anyhow!("No prompt with id {}", id))?;

        if let Some(score) = feedback_score {
            prompt.average_feedback_score = Some(fold_feedback(
                prompt.average_feedback_score,
                prompt.num_interactions,
                score,
            ));
        }
        prompt.num_interactions += 1;
        Ok(())
    }
}

#[async_trait]
impl TaskSource for MemoryStore {
    async fn fetch_tasks_with_feedback(&self, limit: i64) -> Result<Vec<RawTask>> {
        let inner = self.inner.lock().unwrap();
        let mut tasks = inner.tasks.clone();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit.max(0) as usize);
        Ok(tasks)
    }
}
