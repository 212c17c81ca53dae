//! Plan structuring records: Task, Milestone, ProjectStructure, StructuredPlan

use serde::{Deserialize, Serialize};

use super::priority::Priority;

/// A concrete task within the project plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier within the plan
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub priority: Priority,

    /// Milestone this task belongs to
    pub milestone_id: String,

    /// IDs of tasks this task depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub estimated_effort: String,

    /// Display order within the milestone
    #[serde(default)]
    pub order_index: i32,
}

/// A milestone representing a significant checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    /// Unique milestone identifier within the plan
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Display order within the plan
    #[serde(default)]
    pub order_index: i32,

    /// IDs of tasks belonging to this milestone (derived from `Task::milestone_id`)
    #[serde(default)]
    pub task_ids: Vec<String>,
}

/// Organized project structure produced by the structure stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStructure {
    pub title: String,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub milestones: Vec<Milestone>,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub estimated_duration: String,
}

/// Final structured project plan, the pipeline's terminal artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredPlan {
    pub title: String,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub milestones: Vec<Milestone>,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub estimated_duration: String,

    #[serde(default)]
    pub risks: Vec<String>,

    #[serde(default)]
    pub assumptions: Vec<String>,
}

/// Shared read access to the milestone/task graph of a plan-like record
pub trait PlanShape {
    fn milestones(&self) -> &[Milestone];
    fn tasks(&self) -> &[Task];

    /// Milestones sorted by `order_index` (stable for ties)
    fn milestones_in_order(&self) -> Vec<&Milestone> {
        let mut milestones: Vec<&Milestone> = self.milestones().iter().collect();
        milestones.sort_by_key(|m| m.order_index);
        milestones
    }

    /// Tasks assigned to a milestone, sorted by `order_index` (stable for ties)
    fn tasks_for(&self, milestone_id: &str) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks().iter().filter(|t| t.milestone_id == milestone_id).collect();
        tasks.sort_by_key(|t| t.order_index);
        tasks
    }
}

impl PlanShape for ProjectStructure {
    fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

impl PlanShape for StructuredPlan {
    fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

/// Rebuild every milestone's `task_ids` from the tasks' `milestone_id`
fn reconciled_milestones(milestones: &[Milestone], tasks: &[Task]) -> Vec<Milestone> {
    milestones
        .iter()
        .map(|m| {
            let mut members: Vec<&Task> = tasks.iter().filter(|t| t.milestone_id == m.id).collect();
            members.sort_by_key(|t| t.order_index);
            Milestone {
                task_ids: members.iter().map(|t| t.id.clone()).collect(),
                ..m.clone()
            }
        })
        .collect()
}

impl ProjectStructure {
    /// New structure whose milestone `task_ids` match the task assignment
    pub fn reconciled(&self) -> Self {
        Self {
            milestones: reconciled_milestones(&self.milestones, &self.tasks),
            ..self.clone()
        }
    }
}

impl StructuredPlan {
    /// New plan whose milestone `task_ids` match the task assignment
    pub fn reconciled(&self) -> Self {
        Self {
            milestones: reconciled_milestones(&self.milestones, &self.tasks),
            ..self.clone()
        }
    }
}
