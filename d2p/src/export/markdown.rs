//! Markdown rendering of a finalized plan

use tracing::debug;

use crate::domain::{PlanShape, StructuredPlan, Task};

fn render_task(out: &mut String, task: &Task) {
    out.push_str(&format!("- [ ] **{}** [{}]\n", task.title, task.priority));
    if !task.description.trim().is_empty() {
        out.push_str(&format!("  {}\n", task.description));
    }
    if !task.estimated_effort.trim().is_empty() {
        out.push_str(&format!("  _Effort: {}_\n", task.estimated_effort));
    }
}

fn render_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("## {}\n\n", heading));
    for item in items {
        out.push_str(&format!("- {}\n", item));
    }
    out.push('\n');
}

/// Render the plan as a markdown checklist
///
/// Milestones and the tasks inside each are ordered by `orderIndex`. Tasks
/// that name an unknown milestone are not rendered.
pub fn to_markdown(plan: &StructuredPlan) -> String {
    debug!(title = %plan.title, milestones = plan.milestones.len(), "to_markdown: called");
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", plan.title));
    out.push_str(&format!("**Summary**: {}\n\n", plan.summary));
    out.push_str(&format!("**Estimated Duration**: {}\n\n", plan.estimated_duration));

    for milestone in plan.milestones_in_order() {
        out.push_str(&format!("## {}\n\n", milestone.name));
        if !milestone.description.trim().is_empty() {
            out.push_str(&format!("{}\n\n", milestone.description));
        }
        for task in plan.tasks_for(&milestone.id) {
            render_task(&mut out, task);
        }
        out.push('\n');
    }

    render_list(&mut out, "Risks", &plan.risks);
    render_list(&mut out, "Assumptions", &plan.assumptions);

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}
