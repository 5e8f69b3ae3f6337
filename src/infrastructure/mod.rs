pub mod config;
pub mod error;
pub mod preference_store;
pub mod routine_repository;
pub mod storage;
pub mod task_repository;
pub mod time_slot_repository;
