pub mod config;
pub mod database;
pub mod deletion;
pub mod entity;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod repository;
pub mod scanner;
pub mod state;
pub mod workflow;

pub use error::{PublishError, RollbackReason};
pub use workflow::{PublishState, PublishWorkflow};
