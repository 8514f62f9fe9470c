//! Minimal orchestration loop over the memory store.
//!
//! An objective is planned into steps; each step runs a tool, is critiqued
//! against the objective and logged as an experience. The outcome is then
//! passed through the curator and memorised when it looks safe and useful.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::curator::{curator_check, CuratorVerdict};
use crate::error::Result;
use crate::experience::{auto_critique, Critique, NewExperience};
use crate::memory::{NewMemory, NodeId, SqliteMemoryStore};
use crate::retrieval::hybrid_retrieve;

/// Tool that runs hybrid retrieval over the store.
pub const MEMORY_SEARCH_TOOL: &str = "memory.search";

/// Source label of memories written by the playbook.
pub const PLAYBOOK_SOURCE: &str = "agent.play";

const NO_MEMORY: &str = "(no relevant memory)";
const UNKNOWN_TOOL: &str = "(tool not implemented)";

/// Parameters for [`Playbook`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybookConfig {
    /// Outcomes at or above this risk are never memorised
    pub persist_max_risk: f64,
    /// Outcomes must exceed this utility to be memorised
    pub persist_min_utility: f64,
    /// Memories quoted in a retrieval capsule
    pub capsule_nodes: usize,
    /// Characters quoted per memory
    pub capsule_chars: usize,
}

impl Default for PlaybookConfig {
    fn default() -> Self {
        Self {
            persist_max_risk: 0.3,
            persist_min_utility: 0.25,
            capsule_nodes: 3,
            capsule_chars: 180,
        }
    }
}

/// A planned step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step: String,
    pub tool: String,
    pub input: String,
}

/// A step together with what it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: PlanStep,
    pub output: String,
    pub critique: Critique,
}

/// Result of running an objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveRun {
    pub objective: String,
    pub timeline: Vec<StepOutcome>,
    /// Curator verdict on the outcome summary
    pub verdict: CuratorVerdict,
    /// Set when the outcome was stored as a memory
    pub memorized_id: Option<NodeId>,
}

/// Plans, executes and records objectives against one store.
pub struct Playbook<'a> {
    store: &'a SqliteMemoryStore,
}

impl<'a> Playbook<'a> {
    /// Create a playbook over `store`, using the store's configuration.
    pub fn new(store: &'a SqliteMemoryStore) -> Self {
        Self { store }
    }

    /// Steps for an objective. Currently a single memory retrieval.
    pub fn plan_steps(&self, objective: &str) -> Vec<PlanStep> {
        vec![PlanStep {
            step: "retrieve".to_string(),
            tool: MEMORY_SEARCH_TOOL.to_string(),
            input: objective.to_string(),
        }]
    }

    /// Run one step and return its textual output.
    pub fn run_step(&self, step: &PlanStep) -> Result<String> {
        match step.tool.as_str() {
            MEMORY_SEARCH_TOOL => {
                let config = self.store.config();
                let result = hybrid_retrieve(self.store, &step.input, &config.hybrid)?;
                let capsule: Vec<String> = result
                    .nodes
                    .iter()
                    .take(config.playbook.capsule_nodes)
                    .map(|node| {
                        let excerpt: String =
                            node.text.chars().take(config.playbook.capsule_chars).collect();
                        format!("- ({:.2}) {}", node.score, excerpt)
                    })
                    .collect();

                if capsule.is_empty() {
                    Ok(NO_MEMORY.to_string())
                } else {
                    Ok(capsule.join("\n"))
                }
            }
            other => {
                debug!(tool = other, "no handler for tool");
                Ok(UNKNOWN_TOOL.to_string())
            }
        }
    }

    /// Plan and run `objective`, logging every step.
    ///
    /// With `persist`, the outcome summary is stored as a memory when the
    /// curator rates it below the risk ceiling and above the utility floor.
    #[instrument(skip(self))]
    pub fn run_objective(&self, objective: &str, persist: bool) -> Result<ObjectiveRun> {
        let config = self.store.config();
        let mut timeline = Vec::new();

        for step in self.plan_steps(objective) {
            let output = self.run_step(&step)?;
            let critique = auto_critique(objective, &output, config.experience.critique_threshold);

            self.store.experience_log(&NewExperience {
                objective: objective.to_string(),
                step: step.step.clone(),
                tool: step.tool.clone(),
                input: step.input.clone(),
                output: output.clone(),
                ok: critique.ok,
            })?;

            timeline.push(StepOutcome {
                step,
                output,
                critique,
            });
        }

        let last_output = timeline
            .last()
            .map(|outcome| outcome.output.as_str())
            .unwrap_or_default();
        let summary = format!("Objective: {}\nResult:\n{}", objective, last_output);
        let verdict = curator_check(self.store, &summary, &config.curator)?;

        let mut memorized_id = None;
        if persist
            && verdict.risk < config.playbook.persist_max_risk
            && verdict.utility > config.playbook.persist_min_utility
        {
            let memory = NewMemory::new(summary)
                .with_source(PLAYBOOK_SOURCE)
                .with_metadata("curator", serde_json::to_value(&verdict)?);
            let id = self.store.upsert(&memory)?;
            info!(node_id = %id, "memorised objective outcome");
            memorized_id = Some(id);
        }

        Ok(ObjectiveRun {
            objective: objective.to_string(),
            timeline,
            verdict,
            memorized_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curator::CuratorDecision;

    const LONG_OBJECTIVE: &str = "Prepare the quarterly upsell plan for Ana, covering current \
        licence usage, renewal date, open support tickets and the expansion options discussed \
        in the last business review";

    #[test]
    fn test_plan_is_single_retrieval() {
        let store = SqliteMemoryStore::in_memory().unwrap();
        let steps = Playbook::new(&store).plan_steps("plan ana upsell");

        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step, "retrieve");
        assert_eq!(steps[0].tool, MEMORY_SEARCH_TOOL);
        assert_eq!(steps[0].input, "plan ana upsell");
    }

    #[test]
    fn test_run_step_on_empty_store() {
        let store = SqliteMemoryStore::in_memory().unwrap();
        let playbook = Playbook::new(&store);
        let step = &playbook.plan_steps("anything")[0];

        assert_eq!(playbook.run_step(step).unwrap(), NO_MEMORY);
    }

    #[test]
    fn test_run_step_unknown_tool() {
        let store = SqliteMemoryStore::in_memory().unwrap();
        let step = PlanStep {
            step: "search".to_string(),
            tool: "web.search".to_string(),
            input: "rust".to_string(),
        };

        assert_eq!(Playbook::new(&store).run_step(&step).unwrap(), UNKNOWN_TOOL);
    }

    #[test]
    fn test_capsule_quotes_top_memories() {
        let store = SqliteMemoryStore::in_memory().unwrap();
        let long_text = "x".repeat(300);
        store.upsert_memory(&long_text, None, None).unwrap();
        for text in ["one", "two", "three", "four"] {
            store.upsert_memory(text, None, None).unwrap();
        }
        let playbook = Playbook::new(&store);

        let capsule = playbook.run_step(&playbook.plan_steps(&long_text)[0]).unwrap();
        let lines: Vec<&str> = capsule.lines().collect();

        assert_eq!(lines.len(), 3);
        // Exact match ranks first: similarity 1 plus the fresh-memory boost
        assert_eq!(lines[0], format!("- (1.15) {}", "x".repeat(180)));
        assert!(lines.iter().all(|line| line.starts_with("- (")));
    }

    #[test]
    fn test_run_objective_logs_every_step() {
        let store = SqliteMemoryStore::in_memory().unwrap();
        let playbook = Playbook::new(&store);

        let run = playbook.run_objective("plan ana upsell", false).unwrap();

        assert_eq!(run.timeline.len(), 1);
        assert_eq!(run.timeline[0].output, NO_MEMORY);
        assert!(!run.timeline[0].critique.ok);
        assert_eq!(run.memorized_id, None);
        assert_eq!(store.stats().unwrap().total_experiences, 1);
        assert_eq!(store.stats().unwrap().total_nodes, 0);
    }

    #[test]
    fn test_run_objective_memorises_useful_outcome() {
        let store = SqliteMemoryStore::in_memory().unwrap();
        let playbook = Playbook::new(&store);

        let run = playbook.run_objective(LONG_OBJECTIVE, true).unwrap();

        let id = run.memorized_id.expect("outcome should be memorised");
        let node = store.get_node(id).unwrap().unwrap();
        assert_eq!(node.source.as_deref(), Some(PLAYBOOK_SOURCE));
        assert!(node.text.starts_with("Objective: Prepare the quarterly upsell plan"));
        assert!(node.text.ends_with(NO_MEMORY));
        assert_eq!(
            node.metadata["curator"]["decision"],
            serde_json::Value::from("accommodate")
        );
        assert_eq!(run.verdict.decision, CuratorDecision::Accommodate);
    }

    #[test]
    fn test_run_objective_skips_risky_outcome() {
        let store = SqliteMemoryStore::in_memory().unwrap();
        let playbook = Playbook::new(&store);
        let objective = format!("{} https://crm.example.com/ana", LONG_OBJECTIVE);

        // URL penalty alone stays below the risk ceiling
        let run = playbook.run_objective(&objective, true).unwrap();
        assert!((run.verdict.risk - 0.1).abs() < 1e-9);
        assert!(run.memorized_id.is_some());

        let mut config = store.config().clone();
        config.playbook.persist_max_risk = 0.05;
        let strict = SqliteMemoryStore::in_memory_with(
            config,
            std::sync::Arc::new(crate::embedding::HashEmbedder::default()),
        )
        .unwrap();
        let run = Playbook::new(&strict).run_objective(&objective, true).unwrap();
        assert_eq!(run.memorized_id, None);
    }

    #[test]
    fn test_successful_steps_become_reusable() {
        let store = SqliteMemoryStore::in_memory().unwrap();
        store
            .upsert_memory("plan ana upsell: propose the premium tier", None, None)
            .unwrap();
        let playbook = Playbook::new(&store);

        let run = playbook.run_objective("plan ana upsell", false).unwrap();
        assert!(run.timeline[0].critique.ok);

        let records = store.reuse_playbook("ana upsell", 5).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool, MEMORY_SEARCH_TOOL);
    }
}
