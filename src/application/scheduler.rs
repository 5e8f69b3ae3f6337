//! Recalculation orchestrator.
//!
//! One recalculation run loads the user's scheduling inputs, clears the
//! previously generated plan from "now" onward, recomputes availability, and
//! persists a fresh set of scheduled slots. Unplaceable tasks come back as
//! conflicts in the outcome, never as errors.

use crate::domain::models::{SlotStatus, TimeSlot};
use crate::engine::allocator::{Allocator, Conflict};
use crate::engine::availability::{compute_free_intervals, schedule_end_date};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::preference_store::PreferenceStore;
use crate::infrastructure::routine_repository::RoutineRepository;
use crate::infrastructure::task_repository::TaskRepository;
use crate::infrastructure::time_slot_repository::TimeSlotRepository;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

fn next_slot_id() -> String {
    let sequence = NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed);
    format!("slt-{}-{sequence}", Utc::now().timestamp_micros())
}

#[derive(Debug, Clone)]
pub struct RecalculationOutcome {
    /// Number of freshly created scheduled slots.
    pub scheduled: usize,
    pub conflicts: Vec<Conflict>,
}

pub struct ScheduleService<T, R, S, P>
where
    T: TaskRepository,
    R: RoutineRepository,
    S: TimeSlotRepository,
    P: PreferenceStore,
{
    task_repository: Arc<T>,
    routine_repository: Arc<R>,
    slot_repository: Arc<S>,
    preference_store: Arc<P>,
}

impl<T, R, S, P> ScheduleService<T, R, S, P>
where
    T: TaskRepository,
    R: RoutineRepository,
    S: TimeSlotRepository,
    P: PreferenceStore,
{
    pub fn new(
        task_repository: Arc<T>,
        routine_repository: Arc<R>,
        slot_repository: Arc<S>,
        preference_store: Arc<P>,
    ) -> Self {
        Self {
            task_repository,
            routine_repository,
            slot_repository,
            preference_store,
        }
    }

    pub fn recalculate(&self, user_id: &str) -> Result<RecalculationOutcome, InfraError> {
        self.recalculate_at(user_id, Utc::now())
    }

    /// Rebuilds the plan as of `now`. Committed and fixed slots survive; every
    /// other generated slot from `now` onward is replaced.
    pub fn recalculate_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RecalculationOutcome, InfraError> {
        let preference = self.preference_store.get_or_create_default(user_id)?;
        let pending = self.task_repository.list_pending(user_id)?;
        let routines = self.routine_repository.list_all(user_id)?;

        self.slot_repository.delete_future_scheduled(user_id, now)?;
        let committed = self.slot_repository.list_committed(user_id)?;

        let deadlines = pending.iter().map(|task| task.deadline).collect::<Vec<_>>();
        let horizon_end = schedule_end_date(&deadlines, now);
        let pool = compute_free_intervals(now, horizon_end, &preference, &routines, &committed);

        let result =
            Allocator::new(pool, &pending, &preference, now).run(preference.scheduling_mode);

        let slots = result
            .placements
            .iter()
            .map(|placement| TimeSlot {
                id: next_slot_id(),
                user_id: user_id.to_string(),
                task_id: Some(placement.task_id.clone()),
                start_time: placement.start,
                end_time: placement.end,
                status: SlotStatus::Scheduled,
                is_fixed: false,
            })
            .collect::<Vec<_>>();
        self.slot_repository.create_many(&slots)?;

        Ok(RecalculationOutcome {
            scheduled: slots.len(),
            conflicts: result.conflicts,
        })
    }
}
