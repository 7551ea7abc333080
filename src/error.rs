use thiserror::Error;

use crate::analyzing::{InstanceRef, VariableName};

macro_rules! usage_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Usage {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Usage {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors are reserved for programming mistakes of method-body producers, loaders and native
/// methods. Code the interpreter cannot faithfully simulate is never reported through this type;
/// such calls are skipped and their data is marked dirty instead.
///
/// # Error Categories
///
/// ## Program Construction Errors
/// - [`Error::Usage`] - Emitter or API misuse, with the source location of the failed check
/// - [`Error::LabelAlreadyBound`] - A label was set twice
/// - [`Error::UnboundLabel`] - A label was referenced but never set
/// - [`Error::ForeignLabel`] - A label was used with an emitter that did not create it
/// - [`Error::Generator`] - A method-body producer failed
///
/// ## Interpretation Errors
/// - [`Error::UndeclaredVariable`] - A variable was read before it was assigned
/// - [`Error::InvalidInstance`] - An instance handle does not belong to the current run
/// - [`Error::ArgumentOutOfBounds`] - An argument index exceeds the call's argument count
/// - [`Error::NotDataInstance`] - Field access on a direct (native-wrapped) instance
/// - [`Error::NoActiveCall`] - An operation needs a call frame but the stack is empty
///
/// ## I/O Errors
/// - [`Error::FileError`] - The trace output file could not be opened or written
///
/// # Examples
///
/// ```rust
/// use dotsim::{Error, analyzing::{Emitter, Label}};
///
/// let mut emitter = Emitter::new();
/// let label = emitter.create_label("end");
/// emitter.set_label(&label).unwrap();
///
/// match emitter.set_label(&label) {
///     Err(Error::LabelAlreadyBound(name)) => assert_eq!(name, "end"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An API was used in a way that violates its contract.
    ///
    /// The error includes the source location where the violation was detected.
    #[error("Usage error - {file}:{line}: {message}")]
    Usage {
        /// The message to be printed for the usage error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A variable was read in a call frame where it was never assigned.
    #[error("Variable '{0}' is not declared in the current call")]
    UndeclaredVariable(VariableName),

    /// An instance handle does not refer to an instance of the current run.
    ///
    /// This is the interpreter's equivalent of assigning a null reference.
    #[error("Invalid instance handle {0}")]
    InvalidInstance(InstanceRef),

    /// A label was set after it had already been bound to an offset.
    #[error("Label '{0}' is already bound")]
    LabelAlreadyBound(String),

    /// A label was referenced by a jump but never bound.
    #[error("Label '{0}' was never bound")]
    UnboundLabel(String),

    /// A label was passed to an emitter which did not create it.
    #[error("Label '{0}' belongs to a different emitter")]
    ForeignLabel(String),

    /// A method-body producer returned an error while generating its program.
    #[error("Method body generation failed - {0}")]
    Generator(#[source] Box<Error>),

    /// An argument index was out of bounds for the active call.
    #[error("Argument index {index} out of bounds, the call has {count} arguments")]
    ArgumentOutOfBounds {
        /// The requested argument index
        index: usize,
        /// The number of arguments of the call
        count: usize,
    },

    /// A field was accessed on a direct instance.
    #[error("Instance {0} wraps a native value and has no fields")]
    NotDataInstance(InstanceRef),

    /// An operation needs an active call frame, but the call stack is empty.
    #[error("No active call on the call stack")]
    NoActiveCall,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors raised while opening or writing trace output files.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_records_location() {
        let err = usage_error!("bad index {}", 3);
        match err {
            Error::Usage {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "bad index 3");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_generator_error_keeps_source() {
        let err = Error::Generator(Box::new(Error::UnboundLabel("loop".to_string())));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("Label 'loop' was never bound"));
    }
}
