//! Streaming parser for the optimizer trace printed by `--print-opt-source`.
//!
//! The trace is interleaved with whatever else the child writes to stdout.
//! Two kinds of records matter:
//!
//! ```text
//! --- FUNCTION SOURCE (/app/server.js:handle) id{4,-1} start{812} ---
//! (function body...)
//! --- END ---
//! --- FUNCTION SOURCE (/app/util.js:parse) id{4,0} start{120} ---
//! (function body...)
//! --- END ---
//! INLINE (parse) id{4,0} AS 1 AT <0:845>
//! ```
//!
//! A header with index -1 is the function being optimized (the root); any
//! other index is a candidate inlinee. An `INLINE (name)` declaration is
//! attributed to the most recent inlinee header, and only when the names
//! match exactly. Blocks are not transactional: under buffering pressure a
//! header can show up before the previous block's END. Nothing is repaired,
//! associations that cannot be proven are dropped.

use super::lines::LineSplitter;
use super::schema::{InliningRecord, OptimizationFrame};
use crate::utils::config::ANONYMOUS_FUNCTION;
use log::{debug, trace};
use regex::Regex;
use std::io::{self, Read, Write};
use std::sync::{LazyLock, Mutex};

/// `INLINE (<name>) ...` declaration
pub const INLINE_PATTERN: &str = r"^INLINE \((?P<name>[^)]*)\)";

/// Any line opening a function source block
pub const FUNCTION_SOURCE_PREFIX: &str = r"^--- FUNCTION SOURCE \(";

/// Full function source header with its captures
pub const FUNCTION_SOURCE_PATTERN: &str = r"^--- FUNCTION SOURCE \((?P<file>.*):(?P<function>[^:]*)\) id\{(?P<id>\d+),(?P<index>-?\d+)\} start\{(?P<start>\d+)\}";

/// Closes a function source block
pub const END_PATTERN: &str = r"^--- END ---";

#[allow(clippy::unwrap_used)]
static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(INLINE_PATTERN).unwrap());
#[allow(clippy::unwrap_used)]
static FUNCTION_SOURCE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(FUNCTION_SOURCE_PREFIX).unwrap());
#[allow(clippy::unwrap_used)]
static FUNCTION_SOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(FUNCTION_SOURCE_PATTERN).unwrap());
#[allow(clippy::unwrap_used)]
static END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(END_PATTERN).unwrap());

/// Parser mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Between blocks; unrecognized lines pass through
    Normal,
    /// Inside a function source dump; everything is swallowed until END
    InOptSourceBlock,
}

/// What happened to a line fed into the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Part of the trace, must not be forwarded
    Consumed,
    /// Regular program output, forward unchanged
    PassThrough,
}

/// Stateful trace parser
///
/// **Public** - fed line by line by the supervisor's stdout reader
#[derive(Debug)]
pub struct TraceParser {
    mode: ParseMode,
    root: Option<OptimizationFrame>,
    last_optimized: Option<OptimizationFrame>,
    inlined: InliningRecord,
}

impl Default for TraceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceParser {
    pub fn new() -> Self {
        Self {
            mode: ParseMode::Normal,
            root: None,
            last_optimized: None,
            inlined: InliningRecord::new(),
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Inlining associations collected so far
    pub fn inlined(&self) -> &InliningRecord {
        &self.inlined
    }

    /// Feed one line (without its terminator)
    pub fn feed_line(&mut self, line: &str) -> LineOutcome {
        match self.mode {
            ParseMode::InOptSourceBlock => {
                if END_RE.is_match(line) {
                    self.mode = ParseMode::Normal;
                } else if FUNCTION_SOURCE_PREFIX_RE.is_match(line) {
                    trace!("Function source header inside an open block, ignored: {}", line);
                }
                LineOutcome::Consumed
            }
            ParseMode::Normal => {
                if let Some(caps) = INLINE_RE.captures(line) {
                    self.handle_inline(&caps["name"]);
                    LineOutcome::Consumed
                } else if FUNCTION_SOURCE_PREFIX_RE.is_match(line) {
                    self.mode = ParseMode::InOptSourceBlock;
                    self.handle_function_source(line);
                    LineOutcome::Consumed
                } else {
                    LineOutcome::PassThrough
                }
            }
        }
    }

    /// Finish parsing and hand over the collected associations
    pub fn finish(self) -> InliningRecord {
        self.inlined
    }

    fn handle_inline(&mut self, name: &str) {
        let Some(frame) = &self.last_optimized else {
            trace!("INLINE ({}) without a preceding optimized frame, dropped", name);
            return;
        };

        if frame.function != name {
            trace!(
                "INLINE ({}) does not match last optimized frame {}, dropped",
                name,
                frame.function
            );
            return;
        }

        self.inlined.record(frame.clone());
    }

    fn handle_function_source(&mut self, line: &str) {
        let Some(frame) = parse_function_source(line) else {
            trace!("Unparseable function source header: {}", line);
            return;
        };

        if frame.is_root() {
            self.root = Some(frame);
        } else {
            self.last_optimized = Some(OptimizationFrame {
                caller: self.root.clone().map(Box::new),
                ..frame
            });
        }
    }
}

/// Parse a `--- FUNCTION SOURCE (...)` header into a frame without caller
///
/// **Public** - also useful when inspecting raw traces
pub fn parse_function_source(line: &str) -> Option<OptimizationFrame> {
    let caps = FUNCTION_SOURCE_RE.captures(line)?;

    let function = match &caps["function"] {
        "" => ANONYMOUS_FUNCTION.to_string(),
        name => name.to_string(),
    };

    Some(OptimizationFrame {
        function,
        file: caps["file"].to_string(),
        id: caps["id"].parse().ok()?,
        index: caps["index"].parse().ok()?,
        start: caps["start"].parse().ok()?,
        caller: None,
    })
}

/// Run a parser over a whole stream, forwarding unrecognized lines
///
/// **Public** - convenience wrapper around `pump_stream`
///
/// # Arguments
/// * `reader` - Raw child output
/// * `out` - Destination for lines that are not part of the trace
///
/// # Returns
/// The inlining associations once `reader` reaches end of stream
pub fn parse_stream<R: Read, W: Write>(reader: R, out: W) -> io::Result<InliningRecord> {
    let parser = Mutex::new(TraceParser::new());
    pump_stream(reader, out, &parser)?;

    let parser = parser
        .into_inner()
        .map_err(|_| io::Error::other("trace parser poisoned"))?;
    Ok(parser.finish())
}

/// Feed a stream into a shared parser until end of stream
///
/// **Public** - used by the supervisor, which may need the associations
/// collected so far while the stream is still held open elsewhere.
///
/// Forwarded lines keep their original terminator, so program output
/// passes through byte for byte (modulo invalid UTF-8).
pub fn pump_stream<R: Read, W: Write>(
    reader: R,
    mut out: W,
    parser: &Mutex<TraceParser>,
) -> io::Result<()> {
    let mut forwarded = 0usize;

    for line in LineSplitter::new(reader) {
        let line = line?;
        let outcome = parser
            .lock()
            .map_err(|_| io::Error::other("trace parser poisoned"))?
            .feed_line(&line.text);

        if outcome == LineOutcome::PassThrough {
            out.write_all(&line.into_bytes())?;
            out.flush()?;
            forwarded += 1;
        }
    }

    debug!("Trace stream closed: {} lines forwarded", forwarded);
    Ok(())
}
