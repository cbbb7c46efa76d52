//! V8 Trace Studio
//!
//! Profiles V8-based processes and recovers the optimizer's inlining
//! decisions from its trace output while the process runs.
//!
//! This crate provides the core implementation for the
//! `v8-trace` CLI tool.
//!
//! ## Getting Started
//!
//! ```bash
//! v8-trace profile -- server.js --port 3000
//! v8-trace profile --on-port 'autocannon localhost:$PORT' -- server.js
//! v8-trace inspect --dir 12345.v8trace
//! ```

pub mod artifact;
pub mod commands;
pub mod output;
pub mod parser;
pub mod supervisor;
pub mod utils;
