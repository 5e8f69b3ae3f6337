//! Task allocation strategies.
//!
//! Two interchangeable policies consume the free-interval pool: fast mode
//! places each task as early as possible in deadline order; spread mode
//! distributes sessions across the work days before each deadline, honoring
//! dependency order. Both report tasks they could not place as conflicts
//! rather than errors.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::{SchedulingMode, Task, UserPreference};
use crate::engine::availability::work_days_between;
use crate::engine::dependency::resolution_order;
use crate::engine::interval::{FreeInterval, IntervalPool};

/// A task that could not be given a valid placement before its deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conflict {
    pub task_id: String,
    pub message: String,
}

/// A committed work session, ready to be persisted as a scheduled time slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlacement {
    pub task_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AllocationResult {
    pub placements: Vec<SessionPlacement>,
    pub conflicts: Vec<Conflict>,
}

/// Owns the working interval pool for one recalculation run and mutates it
/// as sessions are consumed.
pub struct Allocator<'a> {
    pool: IntervalPool,
    tasks: &'a [Task],
    preference: &'a UserPreference,
    now: DateTime<Utc>,
    placements: Vec<SessionPlacement>,
    conflicts: Vec<Conflict>,
    placed: HashSet<String>,
    failed: HashSet<String>,
}

impl<'a> Allocator<'a> {
    pub fn new(
        pool: IntervalPool,
        tasks: &'a [Task],
        preference: &'a UserPreference,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            pool,
            tasks,
            preference,
            now,
            placements: Vec::new(),
            conflicts: Vec::new(),
            placed: HashSet::new(),
            failed: HashSet::new(),
        }
    }

    pub fn run(mut self, mode: SchedulingMode) -> AllocationResult {
        match mode {
            SchedulingMode::Fast => self.allocate_fast(),
            SchedulingMode::Spread => self.allocate_spread(),
        }
        AllocationResult {
            placements: self.placements,
            conflicts: self.conflicts,
        }
    }

    /// Fast mode: earliest possible placement, deadline order, priority
    /// tie-break.
    fn allocate_fast(&mut self) {
        let mut order: Vec<&Task> = self.tasks.iter().filter(|task| task.is_pending()).collect();
        order.sort_by(|left, right| {
            left.deadline
                .cmp(&right.deadline)
                .then_with(|| left.priority.rank().cmp(&right.priority.rank()))
        });

        for task in order {
            if self.placed.contains(&task.id) {
                continue;
            }
            if !self.place_earliest(task) {
                self.record_unschedulable(task);
            }
        }
    }

    /// Spread mode: dependency pass first, then remaining tasks grouped by
    /// deadline and distributed across the work days before it.
    fn allocate_spread(&mut self) {
        let tasks_by_id: HashMap<&str, &Task> = self
            .tasks
            .iter()
            .map(|task| (task.id.as_str(), task))
            .collect();

        for root in self.tasks.iter().filter(|task| !task.dependencies.is_empty()) {
            if !root.is_pending() {
                continue;
            }
            match resolution_order(root, &tasks_by_id) {
                Ok(order) => {
                    for member in order {
                        if !member.is_pending()
                            || self.placed.contains(&member.id)
                            || self.failed.contains(&member.id)
                        {
                            continue;
                        }
                        let available_days = work_days_between(
                            self.preference,
                            self.now.date_naive(),
                            member.deadline.date_naive(),
                        );
                        if !self.place_spread(member, available_days) {
                            self.record_unschedulable(member);
                        }
                    }
                }
                Err(cycle) => {
                    self.conflicts.push(Conflict {
                        task_id: root.id.clone(),
                        message: format!(
                            "Dependency cycle detected while scheduling task \"{}\" (at task {})",
                            root.title, cycle.task_id
                        ),
                    });
                }
            }
        }

        // Remaining tasks, grouped by deadline date in ascending order.
        let mut groups: BTreeMap<chrono::NaiveDate, Vec<&Task>> = BTreeMap::new();
        for task in self.tasks.iter().filter(|task| {
            task.is_pending()
                && task.dependencies.is_empty()
                && !self.placed.contains(&task.id)
                && !self.failed.contains(&task.id)
        }) {
            groups.entry(task.deadline.date_naive()).or_default().push(task);
        }

        for (deadline_date, mut group) in groups {
            group.sort_by_key(|task| task.priority.rank());
            let available_days =
                work_days_between(self.preference, self.now.date_naive(), deadline_date);
            for task in group {
                if self.placed.contains(&task.id) {
                    continue;
                }
                if !self.place_spread(task, available_days) {
                    self.record_unschedulable(task);
                }
            }
        }
    }

    /// Places the task's single session in the first eligible interval.
    fn place_earliest(&mut self, task: &Task) -> bool {
        let Some(interval) = self
            .pool
            .first_eligible(None, task.min_work_session, task.deadline)
        else {
            return false;
        };
        self.commit(task, &interval);
        true
    }

    /// Distributes the task's sessions across eligible days, at most
    /// `ceil(sessions / available_days)` per day, falling back to any
    /// remaining eligible interval.
    ///
    /// Every task currently needs exactly one session; the per-day target
    /// stays expressed over `sessions_needed` so multi-session tasks remain a
    /// data change.
    fn place_spread(&mut self, task: &Task, available_days: i64) -> bool {
        let sessions_needed: i64 = 1;
        let target_per_day = (sessions_needed + available_days - 1) / available_days;
        let mut scheduled: i64 = 0;

        for date in self.pool.dates() {
            let mut daily: i64 = 0;
            while daily < target_per_day && scheduled < sessions_needed {
                let Some(interval) =
                    self.pool
                        .first_eligible(Some(date), task.min_work_session, task.deadline)
                else {
                    break;
                };
                self.commit(task, &interval);
                daily += 1;
                scheduled += 1;
            }
            if scheduled >= sessions_needed {
                break;
            }
        }

        // Even distribution failed; take whatever is still eligible.
        while scheduled < sessions_needed {
            let Some(interval) = self
                .pool
                .first_eligible(None, task.min_work_session, task.deadline)
            else {
                break;
            };
            self.commit(task, &interval);
            scheduled += 1;
        }

        scheduled > 0
    }

    /// Commits a minimum-length session at the interval start and consumes
    /// the used sub-range from the pool.
    fn commit(&mut self, task: &Task, interval: &FreeInterval) {
        let start = interval.start_at();
        let end = start + Duration::minutes(task.min_work_session);
        self.placements.push(SessionPlacement {
            task_id: task.id.clone(),
            start,
            end,
        });
        self.pool.subtract_on(
            interval.date,
            interval.start,
            interval.start + task.min_work_session,
        );
        self.placed.insert(task.id.clone());
    }

    /// Records the conflict once per task per run; a task reachable through
    /// several passes must not repeat in the conflict list.
    fn record_unschedulable(&mut self, task: &Task) {
        if !self.failed.insert(task.id.clone()) {
            return;
        }
        self.conflicts.push(Conflict {
            task_id: task.id.clone(),
            message: format!(
                "Could not schedule task \"{}\" before its deadline",
                task.title
            ),
        });
    }
}
