//! Diesel-backed Postgres implementation of the storage traits

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{PromptRecord, PromptStatus, RawTask};
use crate::schema::{agent_prompts, task_feedback, tasks};
use crate::storage::{fold_feedback, validate_traffic, PromptStore, TaskSource};

/// Prompt row from the database
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = agent_prompts)]
pub struct PromptRow {
    pub id: i32,
    pub prompt_text: String,
    pub status: String,
    pub traffic: f64,
    pub num_interactions: i64,
    pub average_feedback_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptRow {
    fn into_record(self) -> Result<PromptRecord> {
        Ok(PromptRecord {
            id: self.id,
            prompt_text: self.prompt_text,
            status: self.status.parse()?,
            traffic: self.traffic,
            num_interactions: self.num_interactions,
            average_feedback_score: self.average_feedback_score,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = agent_prompts)]
struct NewPrompt<'a> {
    prompt_text: &'a str,
    status: &'a str,
    traffic: f64,
}

/// Postgres-backed prompt registry and task source.
#[derive(Clone)]
pub struct PgStore {
    conn: Arc<Mutex<PgConnection>>,
}

impl PgStore {
    pub fn connect(database_url: &str) -> Result<Self> {
        let conn = PgConnection::establish(database_url)
            .context("Failed to connect to database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, PgConnection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))
    }

    fn get_by_status(&self, status: PromptStatus) -> Result<Option<PromptRecord>> {
        let mut conn = self.lock()?;
        let row = agent_prompts::table
            .filter(agent_prompts::status.eq(status.as_str()))
            .select(PromptRow::as_select())
            .first(&mut *conn)
            .optional()?;
        row.map(PromptRow::into_record).transpose()
    }
}

#[async_trait]
impl PromptStore for PgStore {
    async fn get_active_prompt(&self) -> Result<Option<PromptRecord>> {
        self.get_by_status(PromptStatus::Active)
    }

    async fn get_candidate_prompt(&self) -> Result<Option<PromptRecord>> {
        self.get_by_status(PromptStatus::Candidate)
    }

    async fn insert_prompt(&self, text: &str, status: PromptStatus, traffic: f64) -> Result<i32> {
        validate_traffic(traffic)?;
        let mut conn = self.lock()?;
        let id = diesel::insert_into(agent_prompts::table)
            .values(NewPrompt {
                prompt_text: text,
                status: status.as_str(),
                traffic,
            })
            .returning(agent_prompts::id)
            .get_result(&mut *conn)
            .context("Failed to insert prompt")?;
        Ok(id)
    }

    async fn update_prompt_traffic(&self, id: i32, traffic: f64) -> Result<()> {
        validate_traffic(traffic)?;
        let mut conn = self.lock()?;
        diesel::update(agent_prompts::table.find(id))
            .set((
                agent_prompts::traffic.eq(traffic),
                agent_prompts::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut *conn)
            .with_context(|| format!("Failed to update traffic for prompt {}", id))?;
        Ok(())
    }

    async fn update_prompt_status(&self, id: i32, status: PromptStatus) -> Result<()> {
        let mut conn = self.lock()?;
        diesel::update(agent_prompts::table.find(id))
            .set((
                agent_prompts::status.eq(status.as_str()),
                agent_prompts::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut *conn)
            .with_context(|| format!("Failed to update status for prompt {}", id))?;
        Ok(())
    }

    async fn zero_out_all_except(&self, keep: &[i32]) -> Result<()> {
        let mut conn = self.lock()?;
        diesel::update(agent_prompts::table.filter(agent_prompts::id.ne_all(keep.to_vec())))
            .set((
                agent_prompts::traffic.eq(0.0),
                agent_prompts::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut *conn)
            .context("Failed to zero out prompt traffic")?;
        Ok(())
    }

    async fn update_prompt_metrics(&self, id: i32, feedback_score: Option<f64>) -> Result<()> {
        let mut conn = self.lock()?;
        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let (old_count, old_avg) = agent_prompts::table
                .find(id)
                .select((
                    agent_prompts::num_interactions,
                    agent_prompts::average_feedback_score,
                ))
                .for_update()
                .first::<(i64, Option<f64>)>(conn)
                .with_context(|| format!("No prompt with id {}", id))?;

            let new_avg = match feedback_score {
                Some(score) => Some(fold_feedback(old_avg, old_count, score)),
                None => old_avg,
            };

            diesel::update(agent_prompts::table.find(id))
                .set((
                    agent_prompts::num_interactions.eq(old_count + 1),
                    agent_prompts::average_feedback_score.eq(new_avg),
                    agent_prompts::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;
            Ok(())
        })
    }
}

#[async_trait]
impl TaskSource for PgStore {
    async fn fetch_tasks_with_feedback(&self, limit: i64) -> Result<Vec<RawTask>> {
        let mut conn = self.lock()?;
        let rows: Vec<(Uuid, serde_json::Value, DateTime<Utc>, Option<serde_json::Value>)> =
            tasks::table
                .left_outer_join(task_feedback::table)
                .order(tasks::created_at.desc())
                .limit(limit)
                .select((
                    tasks::id,
                    tasks::history,
                    tasks::created_at,
                    task_feedback::feedback_data.nullable(),
                ))
                .load(&mut *conn)
                .context("Failed to fetch tasks")?;

        Ok(rows
            .into_iter()
            .map(|(id, history, created_at, feedback_data)| RawTask {
                id,
                history: history.as_array().cloned().unwrap_or_default(),
                created_at,
                feedback_data,
            })
            .collect())
    }
}
