//! Event tracing for debugging runs.
//!
//! Independent of the [`ExecutionTrace`](crate::analyzing::ExecutionTrace), which is
//! part of every result, the interpreter can emit a stream of [`TraceEvent`]s while
//! it runs. Which events are emitted is selected by [`TraceCategories`] in the
//! [`TracingConfig`](crate::analyzing::TracingConfig).
//!
//! # Output Format
//!
//! Trace events are written as newline-delimited JSON (NDJSON/JSONL).
//! Each line is a complete JSON object representing one trace event.

use std::{
    collections::VecDeque,
    fmt::Write as FmtWrite,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    mem,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use bitflags::bitflags;

bitflags! {
    /// Categories of trace events.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TraceCategories: u8 {
        /// One event per executed instruction.
        const INSTRUCTIONS = 0b0001;
        /// Call pushes and returns.
        const CALLS = 0b0010;
        /// Enqueued dynamic calls.
        const DYNAMIC_CALLS = 0b0100;
        /// Skipped calls and tainted instances.
        const TAINT = 0b1000;
    }
}

/// A trace event recorded during a run.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    /// An instruction was executed.
    Instruction {
        /// Method containing the instruction.
        method: String,
        /// Offset within the program.
        offset: usize,
        /// Instruction kind (e.g. "static_call").
        kind: &'static str,
        /// Call stack depth.
        call_depth: usize,
    },

    /// A call frame was pushed.
    Call {
        /// The resolved method.
        method: String,
        /// Number of arguments.
        arg_count: usize,
        /// Call depth after the push.
        call_depth: usize,
        /// Why the frame was pushed.
        kind: &'static str,
    },

    /// A call frame was popped.
    Return {
        /// The method that returned.
        method: String,
        /// Whether a value was returned.
        has_return_value: bool,
        /// Call depth after the pop.
        call_depth: usize,
    },

    /// A dynamic call was enqueued.
    DynamicEnqueue {
        /// The enqueued method.
        method: String,
        /// Method of the enqueuing frame.
        enqueued_by: String,
        /// Length of the frame's own queue after enqueueing.
        queue_len: usize,
    },

    /// A call was skipped.
    CallSkipped {
        /// The called method.
        method: String,
        /// Why it was skipped.
        reason: &'static str,
        /// Number of arguments that were tainted.
        tainted: usize,
    },
}

impl TraceEvent {
    /// Category this event belongs to.
    #[must_use]
    pub fn category(&self) -> TraceCategories {
        match self {
            TraceEvent::Instruction { .. } => TraceCategories::INSTRUCTIONS,
            TraceEvent::Call { .. } | TraceEvent::Return { .. } => TraceCategories::CALLS,
            TraceEvent::DynamicEnqueue { .. } => TraceCategories::DYNAMIC_CALLS,
            TraceEvent::CallSkipped { .. } => TraceCategories::TAINT,
        }
    }

    /// Converts the event to a JSON string.
    #[must_use]
    pub fn to_json(&self) -> String {
        self.to_json_with_context(None)
    }

    /// Converts the event to a JSON string with an optional context prefix.
    ///
    /// When a context is provided, it is included as a "context" field at the
    /// beginning of the JSON object.
    #[must_use]
    pub fn to_json_with_context(&self, context: Option<&str>) -> String {
        let context_prefix = context
            .map(|c| format!(r#""context":"{}","#, escape_json(c)))
            .unwrap_or_default();

        match self {
            TraceEvent::Instruction {
                method,
                offset,
                kind,
                call_depth,
            } => format!(
                r#"{{{}"type":"instruction","method":"{}","offset":{},"kind":"{}","call_depth":{}}}"#,
                context_prefix,
                escape_json(method),
                offset,
                kind,
                call_depth
            ),
            TraceEvent::Call {
                method,
                arg_count,
                call_depth,
                kind,
            } => format!(
                r#"{{{}"type":"call","method":"{}","arg_count":{},"call_depth":{},"kind":"{}"}}"#,
                context_prefix,
                escape_json(method),
                arg_count,
                call_depth,
                kind
            ),
            TraceEvent::Return {
                method,
                has_return_value,
                call_depth,
            } => format!(
                r#"{{{}"type":"return","method":"{}","has_return_value":{},"call_depth":{}}}"#,
                context_prefix,
                escape_json(method),
                has_return_value,
                call_depth
            ),
            TraceEvent::DynamicEnqueue {
                method,
                enqueued_by,
                queue_len,
            } => format!(
                r#"{{{}"type":"dynamic_enqueue","method":"{}","enqueued_by":"{}","queue_len":{}}}"#,
                context_prefix,
                escape_json(method),
                escape_json(enqueued_by),
                queue_len
            ),
            TraceEvent::CallSkipped {
                method,
                reason,
                tainted,
            } => format!(
                r#"{{{}"type":"call_skipped","method":"{}","reason":"{}","tainted":{}}}"#,
                context_prefix,
                escape_json(method),
                reason,
                tainted
            ),
        }
    }
}

/// Escapes a string for JSON output.
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(result, "\\u{:04X}", c as u32);
            }
            c => result.push(c),
        }
    }
    result
}

/// A writer for trace events.
///
/// Handles writing trace events to either a file or an in-memory ring buffer.
pub struct TraceWriter {
    /// File writer if file-based tracing is enabled.
    file: Option<Mutex<BufWriter<File>>>,
    /// In-memory buffer if memory-based tracing is enabled.
    buffer: Option<Mutex<VecDeque<TraceEvent>>>,
    /// Maximum buffer size (0 = unlimited).
    max_entries: usize,
    /// Number of events written.
    event_count: AtomicU64,
    /// Context prefix to include in trace output.
    context_prefix: Option<String>,
}

impl TraceWriter {
    /// Creates a new trace writer for file-based tracing.
    ///
    /// The file is opened in append mode so that several runs can share one trace
    /// file; the context prefix tells their events apart.
    ///
    /// # Arguments
    ///
    /// * `path` - File path to write trace events to
    /// * `context` - Context prefix included in each trace event
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or opened.
    pub fn new_file<P: AsRef<Path>>(path: P, context: Option<String>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(BufWriter::new(file))),
            buffer: None,
            max_entries: 0,
            event_count: AtomicU64::new(0),
            context_prefix: context,
        })
    }

    /// Creates a new trace writer for memory-based tracing.
    ///
    /// # Arguments
    ///
    /// * `max_entries` - Maximum trace entries to keep (0 for unlimited); the oldest
    ///   entries are dropped first
    /// * `context` - Context prefix included in each trace event
    #[must_use]
    pub fn new_memory(max_entries: usize, context: Option<String>) -> Self {
        Self {
            file: None,
            buffer: Some(Mutex::new(VecDeque::with_capacity(max_entries.min(10_000)))),
            max_entries,
            event_count: AtomicU64::new(0),
            context_prefix: context,
        }
    }

    /// Returns the context prefix, if any.
    #[must_use]
    pub fn context_prefix(&self) -> Option<&str> {
        self.context_prefix.as_deref()
    }

    /// Writes a trace event.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of a file-based writer. Memory-based writers never fail.
    pub fn write(&self, event: TraceEvent) -> std::io::Result<()> {
        self.event_count.fetch_add(1, Ordering::Relaxed);

        if let Some(ref file) = self.file {
            if let Ok(mut writer) = file.lock() {
                let json = event.to_json_with_context(self.context_prefix.as_deref());
                writeln!(writer, "{json}")?;
            }
        } else if let Some(ref buffer) = self.buffer {
            if let Ok(mut buf) = buffer.lock() {
                if self.max_entries > 0 && buf.len() >= self.max_entries {
                    buf.pop_front();
                }
                buf.push_back(event);
            }
        }
        Ok(())
    }

    /// Flushes any buffered output.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of a file-based writer.
    pub fn flush(&self) -> std::io::Result<()> {
        if let Some(ref file) = self.file {
            if let Ok(mut writer) = file.lock() {
                writer.flush()?;
            }
        }
        Ok(())
    }

    /// Returns the number of events written.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    /// Takes the in-memory buffer, leaving it empty.
    ///
    /// Returns `None` if this is a file-based writer.
    pub fn take_buffer(&self) -> Option<Vec<TraceEvent>> {
        self.buffer
            .as_ref()
            .and_then(|buf| buf.lock().ok().map(|mut b| mem::take(&mut *b).into()))
    }
}

impl std::fmt::Debug for TraceWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceWriter")
            .field("is_file_based", &self.file.is_some())
            .field("max_entries", &self.max_entries)
            .field("event_count", &self.event_count())
            .finish_non_exhaustive()
    }
}
