//! tuition_assistant — conversational gateway for the university tuition API.
//!
//! This library crate re-exports modules so integration tests
//! (under `tests/`) can access them.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod reconcile;
pub mod session;
pub mod tools;
