//! Inbox Rules: declarative rules evaluated against a stored mailbox snapshot.

pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod rules;
pub mod service;
pub mod store;
