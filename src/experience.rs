//! Experience log, self-critique and playbook reuse.
//!
//! Every orchestration step is appended to the `experiences` table. Steps
//! judged successful can later be replayed for similar objectives through
//! [`SqliteMemoryStore::reuse_playbook`].

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::Result;
use crate::memory::{from_epoch_seconds, to_epoch_seconds, SqliteMemoryStore};

/// Parameters for critique and reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    /// Minimum keyword overlap for a step to count as successful
    pub critique_threshold: f64,
    /// Default number of records returned by playbook reuse
    pub playbook_limit: usize,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            critique_threshold: 0.2,
            playbook_limit: 5,
        }
    }
}

/// Identifier of an experience record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperienceId(pub i64);

impl std::fmt::Display for ExperienceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One orchestration step to be logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExperience {
    pub objective: String,
    pub step: String,
    pub tool: String,
    pub input: String,
    pub output: String,
    pub ok: bool,
}

/// A logged orchestration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub id: ExperienceId,
    pub objective: String,
    pub step: String,
    pub tool: String,
    pub input: String,
    pub output: String,
    pub ok: bool,
    pub created_at: DateTime<Utc>,
}

/// Keyword overlap between an objective and a step's output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    /// Share of objective tokens present in the output
    pub overlap: f64,
    pub ok: bool,
}

impl SqliteMemoryStore {
    /// Append one step to the experience log.
    pub fn experience_log(&self, experience: &NewExperience) -> Result<ExperienceId> {
        let ts = to_epoch_seconds(Utc::now());
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO experiences (objective, step, tool, input, output, ok, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    experience.objective,
                    experience.step,
                    experience.tool,
                    experience.input,
                    experience.output,
                    experience.ok,
                    ts,
                ],
            )?;
            Ok(ExperienceId(conn.last_insert_rowid()))
        })?;

        debug!(experience_id = %id, tool = %experience.tool, ok = experience.ok, "experience logged");
        Ok(id)
    }

    /// Playbook reuse capped at the configured `playbook_limit`.
    pub fn reuse(&self, objective_like: &str) -> Result<Vec<ExperienceRecord>> {
        self.reuse_playbook(objective_like, self.config().experience.playbook_limit)
    }

    /// Successful records whose objective contains `objective_like`, newest
    /// first.
    ///
    /// Matching is a literal, case-sensitive substring test.
    pub fn reuse_playbook(&self, objective_like: &str, limit: usize) -> Result<Vec<ExperienceRecord>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, objective, step, tool, input, output, ok, ts
                 FROM experiences
                 WHERE ok = 1 AND instr(objective, ?1) > 0
                 ORDER BY ts DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![objective_like, limit as i64], |row| {
                    Ok((
                        ExperienceId(row.get(0)?),
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, bool>(6)?,
                        row.get::<_, f64>(7)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(id, objective, step, tool, input, output, ok, ts)| -> Result<_> {
                Ok(ExperienceRecord {
                    id,
                    objective,
                    step,
                    tool,
                    input,
                    output,
                    ok,
                    created_at: from_epoch_seconds(ts)?,
                })
            })
            .collect()
    }
}

/// Letters (including Latin-1 accented ones) and digits.
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-ZÀ-ÿ0-9]+").expect("Invalid regex"));

fn tokens(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Judge `output` by how many of the objective's words it repeats.
pub fn auto_critique(objective: &str, output: &str, threshold: f64) -> Critique {
    let wanted = tokens(objective);
    let produced = tokens(output);

    let shared = wanted.intersection(&produced).count();
    let overlap = shared as f64 / (wanted.len() as f64 + 1e-6);

    Critique {
        overlap,
        ok: overlap >= threshold,
    }
}
