//! Structural checks on generated plans
//!
//! [`validate_plan`] enforces the milestone/task graph invariants every emitted
//! plan must satisfy. [`check_completeness`] is advisory: it reports extracted
//! actions that no task appears to cover, and never fails a run.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::ideas::ExtractedIdeas;
use super::plan::{PlanShape, Task};

/// A single broken invariant in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PlanViolation {
    NoMilestones,
    NoTasks,
    DuplicateMilestoneId { milestone: String },
    DuplicateTaskId { task: String },
    UnknownMilestone { task: String, milestone: String },
    UnknownDependency { task: String, dependency: String },
    SelfDependency { task: String },
    TaskIdsMismatch { milestone: String },
    DependencyCycle { path: Vec<String> },
}

impl fmt::Display for PlanViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMilestones => write!(f, "plan has no milestones"),
            Self::NoTasks => write!(f, "plan has no tasks"),
            Self::DuplicateMilestoneId { milestone } => write!(f, "milestone id '{}' is used more than once", milestone),
            Self::DuplicateTaskId { task } => write!(f, "task id '{}' is used more than once", task),
            Self::UnknownMilestone { task, milestone } => {
                write!(f, "task '{}' references unknown milestone '{}'", task, milestone)
            }
            Self::UnknownDependency { task, dependency } => {
                write!(f, "task '{}' depends on unknown task '{}'", task, dependency)
            }
            Self::SelfDependency { task } => write!(f, "task '{}' depends on itself", task),
            Self::TaskIdsMismatch { milestone } => {
                write!(f, "milestone '{}' taskIds do not match the tasks assigned to it", milestone)
            }
            Self::DependencyCycle { path } => write!(f, "dependency cycle: {}", path.join(" -> ")),
        }
    }
}

/// A plan failed structural validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("plan failed validation: {}", summarize(.violations))]
pub struct ValidationError {
    pub violations: Vec<PlanViolation>,
}

fn summarize(violations: &[PlanViolation]) -> String {
    violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; ")
}

impl ValidationError {
    /// Bullet list suitable for feeding back into a regeneration prompt
    pub fn feedback(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("- {}", v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Knobs for [`validate_plan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Treat dependency cycles as violations
    pub reject_cycles: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self { reject_cycles: true }
    }
}

/// Check the milestone/task graph invariants, collecting every violation found
pub fn validate_plan<P: PlanShape + ?Sized>(plan: &P, options: ValidationOptions) -> Result<(), ValidationError> {
    debug!(
        milestones = plan.milestones().len(),
        tasks = plan.tasks().len(),
        reject_cycles = options.reject_cycles,
        "validate_plan: called"
    );
    let mut violations = Vec::new();

    if plan.milestones().is_empty() {
        violations.push(PlanViolation::NoMilestones);
    }
    if plan.tasks().is_empty() {
        violations.push(PlanViolation::NoTasks);
    }

    let mut milestone_ids = HashSet::new();
    for milestone in plan.milestones() {
        if !milestone_ids.insert(milestone.id.as_str()) {
            violations.push(PlanViolation::DuplicateMilestoneId {
                milestone: milestone.id.clone(),
            });
        }
    }

    let mut task_ids = HashSet::new();
    for task in plan.tasks() {
        if !task_ids.insert(task.id.as_str()) {
            violations.push(PlanViolation::DuplicateTaskId { task: task.id.clone() });
        }
    }

    for task in plan.tasks() {
        if !milestone_ids.contains(task.milestone_id.as_str()) {
            violations.push(PlanViolation::UnknownMilestone {
                task: task.id.clone(),
                milestone: task.milestone_id.clone(),
            });
        }
        for dep in &task.depends_on {
            if *dep == task.id {
                violations.push(PlanViolation::SelfDependency { task: task.id.clone() });
            } else if !task_ids.contains(dep.as_str()) {
                violations.push(PlanViolation::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    for milestone in plan.milestones() {
        let listed: HashSet<&str> = milestone.task_ids.iter().map(String::as_str).collect();
        let assigned: HashSet<&str> = plan
            .tasks()
            .iter()
            .filter(|t| t.milestone_id == milestone.id)
            .map(|t| t.id.as_str())
            .collect();
        if listed != assigned {
            violations.push(PlanViolation::TaskIdsMismatch {
                milestone: milestone.id.clone(),
            });
        }
    }

    if options.reject_cycles
        && let Err(path) = find_dependency_cycle(plan.tasks())
    {
        violations.push(PlanViolation::DependencyCycle { path });
    }

    if violations.is_empty() {
        debug!("validate_plan: ok");
        Ok(())
    } else {
        debug!(count = violations.len(), "validate_plan: violations found");
        Err(ValidationError { violations })
    }
}

/// Detect a cycle in the task dependency graph
///
/// Uses DFS. Self-dependencies and dangling ids are reported separately, so they
/// are skipped here. Returns the cycle path if one is found.
fn find_dependency_cycle(tasks: &[Task]) -> Result<(), Vec<String>> {
    debug!(task_count = tasks.len(), "find_dependency_cycle: called");
    let graph: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut cycle_path = Vec::new();

    // walk in declaration order so the reported path is stable
    for task in tasks {
        let id = task.id.as_str();
        if !visited.contains(id) && has_cycle_dfs(id, &graph, &mut visited, &mut rec_stack, &mut cycle_path) {
            debug!(?cycle_path, "find_dependency_cycle: cycle detected");
            return Err(cycle_path);
        }
    }

    Ok(())
}

fn has_cycle_dfs<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a Task>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    cycle_path: &mut Vec<String>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    cycle_path.push(node.to_string());

    if let Some(task) = graph.get(node) {
        for dep in task.depends_on.iter().map(String::as_str) {
            if dep == node || !graph.contains_key(dep) {
                continue;
            }
            if !visited.contains(dep) {
                if has_cycle_dfs(dep, graph, visited, rec_stack, cycle_path) {
                    return true;
                }
            } else if rec_stack.contains(dep) {
                cycle_path.push(dep.to_string());
                return true;
            }
        }
    }

    rec_stack.remove(node);
    cycle_path.pop();
    false
}

/// Advisory coverage of extracted actions by plan tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessReport {
    pub mapped_actions: Vec<String>,
    pub unmapped_actions: Vec<String>,
}

impl CompletenessReport {
    pub fn is_complete(&self) -> bool {
        self.unmapped_actions.is_empty()
    }
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "the", "to", "of", "for", "in", "on", "with", "into", "from", "by", "or", "at", "is", "be",
    "it", "our", "my", "we", "up", "out", "all", "new", "make", "do", "get", "set",
];

fn significant_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Report which extracted actions map to at least one task
///
/// An action maps to a task when the task's title or description shares a
/// significant word with it. Actions with no significant words count as mapped.
pub fn check_completeness<P: PlanShape + ?Sized>(plan: &P, ideas: &ExtractedIdeas) -> CompletenessReport {
    debug!(actions = ideas.actions.len(), tasks = plan.tasks().len(), "check_completeness: called");
    let task_words: Vec<HashSet<String>> = plan
        .tasks()
        .iter()
        .map(|t| significant_words(&format!("{} {}", t.title, t.description)))
        .collect();

    let mut report = CompletenessReport::default();
    for action in &ideas.actions {
        let words = significant_words(action);
        let mapped = words.is_empty() || task_words.iter().any(|tw| !tw.is_disjoint(&words));
        if mapped {
            report.mapped_actions.push(action.clone());
        } else {
            debug!(%action, "check_completeness: action not covered by any task");
            report.unmapped_actions.push(action.clone());
        }
    }
    report
}
