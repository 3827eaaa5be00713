pub mod activities;
pub mod backup_exchange;
pub mod core;
pub mod evaluations;
pub mod notes;
pub mod reports;
pub mod students;
pub mod synthesis;
pub mod weekly;
