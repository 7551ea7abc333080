// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dotsim
//!
//! A best-effort simulator for .NET method bodies, built to support source code
//! analysis and editing rather than to run programs.
//!
//! Method bodies are lowered into IAL, a small stack-free intermediate language,
//! and interpreted with incomplete knowledge: calls that cannot be resolved are
//! skipped and every value they could have influenced is marked *dirty*. Each run
//! produces a block-granular execution trace that tells an editor which variables
//! held which instance where, which calls were made from which block and how a
//! value can be removed from the source.
//!
//! ## Features
//!
//! - **Stack-free IAL** - Named-variable instructions produced by an `Emitter`
//! - **Cached generators** - Method bodies are built once and shared between calls
//! - **Taint tracking** - Skipped calls mark their arguments and results dirty
//! - **Dynamic calls** - Deferred calls chained in enqueue order after their caller
//! - **Editable trace** - Scope starts and ends per block with removal hooks
//!
//! ## Quick Start
//!
//! ```rust
//! use dotsim::prelude::*;
//!
//! let loader = MethodTable::new().with_method(
//!     MethodId::new("Sample.Greeting"),
//!     Generator::new(|e| {
//!         e.start_new_info_block();
//!         e.assign_literal("text", "hello");
//!         e.return_value("text");
//!         Ok(())
//!     }),
//! );
//!
//! let result = Machine::<AnalyzingConfig>::default().run(&loader, &MethodId::new("Sample.Greeting"), &[])?;
//! assert_eq!(result.return_native().and_then(NativeValue::as_str), Some("hello"));
//! assert_eq!(result.trace.block_count(), 1);
//! # Ok::<(), dotsim::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`analyzing`] - Instance model, IAL programs, the interpreter and its trace
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! Errors are reserved for misuse of the API: malformed programs, unbound labels,
//! reads of undeclared variables or foreign instance handles. Code the interpreter
//! cannot simulate is never an error. See [`Error`] for details.
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade: pushed and
//! popped calls and scheduled dynamic calls at `debug`, skipped calls at `warn`,
//! every executed instruction at `trace`. Structured event tracing independent of
//! the logger is configured with [`analyzing::TracingConfig`].

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dotsim::prelude::*;
///
/// let machine = Machine::new(AnalyzingConfig::strict());
/// assert!(!machine.settings().catch_exceptions);
/// ```
pub mod prelude;

/// Best-effort interpretation of IAL method bodies.
pub mod analyzing;

/// `dotsim` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotsim` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use dotsim::{Error, analyzing::Emitter};
///
/// let mut emitter = Emitter::new();
/// let end = emitter.create_label("end");
/// emitter.jump(&end).unwrap();
///
/// match emitter.get_emitted_instructions() {
///     Err(Error::UnboundLabel(name)) => assert_eq!(name, "end"),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub use error::Error;
