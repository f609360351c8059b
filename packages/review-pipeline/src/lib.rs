//! Review pipeline: periodically harvests app-store reviews and enriches
//! them with LLM-derived sentiment/topic labels via a durable Postgres-backed
//! job queue.

pub mod config;
pub mod domain;
pub mod kernel;
pub mod lifecycle;
pub mod observability;
pub mod processors;
pub mod repository;

pub use config::Config;
