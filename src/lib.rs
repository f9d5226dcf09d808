//! sqltalk: ask questions about a BigQuery dataset in plain language.
//!
//! A Gemini model is given a fixed catalog of warehouse tools; the agent
//! loop runs whatever tools it asks for and feeds the results back until
//! it answers in text.

pub mod agent;
pub mod config;
pub mod model;
pub mod session;
pub mod tools;
pub mod types;
pub mod warehouse;

#[cfg(test)]
mod testing;
