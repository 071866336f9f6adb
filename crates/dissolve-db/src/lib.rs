//! PostgreSQL persistence for companies and their scheduled tasks.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
