//! Deadline-driven day planner.
//!
//! Tasks carry deadlines, priorities and dependencies; routine blocks and
//! committed time slots carve out the busy parts of each day. The engine
//! computes the remaining free intervals and allocates work sessions into
//! them, either as soon as possible or spread toward each deadline. Every
//! mutation of the inputs triggers a full recalculation so the stored plan
//! is always derived state.

pub mod application;
pub mod domain;
pub mod engine;
pub mod infrastructure;

pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::commands::{
    complete_slot_impl, create_routine_impl, create_task_impl, delete_routine_impl,
    delete_task_impl, get_preferences_impl, get_schedule_impl, get_task_impl, list_routines_impl,
    list_tasks_impl, recalculate_schedule_impl, update_preferences_impl, update_routine_impl,
    update_task_impl, AppState, PreferencePatch, RecalculateResponse, RoutineInput, RoutinePatch,
    TaskInput, TaskPatch,
};
pub use application::scheduler::{RecalculationOutcome, ScheduleService};
pub use domain::models::{
    Priority, RoutineBlock, RoutineCategory, SchedulingMode, SlotStatus, Task, TaskStatus,
    TimeSlot, UserPreference, WorkingHours,
};
pub use engine::{AllocationResult, Allocator, Conflict, FreeInterval, IntervalPool};
pub use infrastructure::error::InfraError;
