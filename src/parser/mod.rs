//! Optimizer trace parsing and schema definitions.
//!
//! This module handles:
//! - Splitting raw child output into lines
//! - Recognizing function source blocks and inlining declarations
//! - Defining the inlining schema written to disk

pub mod lines;
pub mod opt_trace;
pub mod schema;

// Re-export main types
pub use lines::{Line, LineSplitter};
pub use opt_trace::{
    parse_function_source, parse_stream, pump_stream, LineOutcome, ParseMode, TraceParser,
};
pub use schema::{InliningRecord, OptimizationFrame};
