//! Dependency resolution for spread-mode allocation.
//!
//! Produces a dependencies-first processing order through an iterative
//! depth-first walk. Cycles terminate the walk for the affected root and are
//! reported as a typed outcome instead of recursing forever.

use std::collections::HashMap;

use crate::domain::models::Task;

/// A dependency cycle reached while expanding `task_id`'s dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected {
    pub task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

/// Returns `root` and its transitive dependencies ordered so that every
/// dependency precedes its dependents; `root` is always last.
///
/// Dependency ids with no matching task are skipped, mirroring how the store
/// tolerates dangling references after a task deletion.
pub fn resolution_order<'a>(
    root: &'a Task,
    tasks_by_id: &HashMap<&str, &'a Task>,
) -> Result<Vec<&'a Task>, CycleDetected> {
    let mut order: Vec<&Task> = Vec::new();
    let mut state: HashMap<&str, VisitState> = HashMap::new();
    // (task, index of the next dependency to expand)
    let mut stack: Vec<(&Task, usize)> = vec![(root, 0)];
    state.insert(root.id.as_str(), VisitState::Visiting);

    while let Some((task, next_dep)) = stack.pop() {
        if next_dep >= task.dependencies.len() {
            state.insert(task.id.as_str(), VisitState::Done);
            order.push(task);
            continue;
        }
        stack.push((task, next_dep + 1));

        let dep_id = task.dependencies[next_dep].as_str();
        let Some(dep_task) = tasks_by_id.get(dep_id) else {
            continue;
        };
        match state.get(dep_id) {
            Some(VisitState::Done) => {}
            Some(VisitState::Visiting) => {
                return Err(CycleDetected {
                    task_id: task.id.clone(),
                });
            }
            None => {
                state.insert(dep_id, VisitState::Visiting);
                stack.push((dep_task, 0));
            }
        }
    }

    Ok(order)
}
