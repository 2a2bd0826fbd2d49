use crate::core::Value;

/// Errors surfaced by the engine.
///
/// The first group mirrors the language-level error constructors and is
/// catchable by evaluated code. `Unsupported`, `PossibleSideEffect`,
/// `Timeout`, `Interrupted`, `Stalled` and `Internal` are engine conditions:
/// they abort the evaluation and are never observable from inside it.
#[derive(thiserror::Error, Debug, Clone)]
pub enum JSError {
    #[error("SyntaxError: {message} ({line}:{column})")]
    SyntaxError { message: String, line: u32, column: u32 },

    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("ReferenceError: {message}")]
    ReferenceError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Possible side effect: {message}")]
    PossibleSideEffect { message: String },

    #[error("Evaluation timed out after {millis}ms")]
    Timeout { millis: u128 },

    #[error("Evaluation interrupted")]
    Interrupted,

    #[error("Evaluation stalled: no pending jobs, tasks or timers can settle the result")]
    Stalled,

    #[error("Uncaught {message}")]
    Thrown { value: Value, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl JSError {
    /// True for conditions the evaluated program cannot catch.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            JSError::Unsupported { .. }
                | JSError::PossibleSideEffect { .. }
                | JSError::Timeout { .. }
                | JSError::Interrupted
                | JSError::Stalled
                | JSError::Internal { .. }
        )
    }

    /// Name of the language error constructor this error materializes as.
    pub fn constructor_name(&self) -> Option<&'static str> {
        match self {
            JSError::SyntaxError { .. } => Some("SyntaxError"),
            JSError::TypeError { .. } => Some("TypeError"),
            JSError::ReferenceError { .. } => Some("ReferenceError"),
            JSError::RangeError { .. } => Some("RangeError"),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            JSError::SyntaxError { message, .. }
            | JSError::TypeError { message }
            | JSError::ReferenceError { message }
            | JSError::RangeError { message }
            | JSError::Unsupported { message }
            | JSError::PossibleSideEffect { message }
            | JSError::Thrown { message, .. }
            | JSError::Internal { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// The thrown value when the error escaped as a language exception.
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            JSError::Thrown { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl From<JSError> for std::io::Error {
    fn from(err: JSError) -> std::io::Error {
        std::io::Error::other(err.to_string())
    }
}

#[macro_export]
macro_rules! raise_type_error {
    ($($arg:tt)*) => {
        $crate::JSError::TypeError { message: format!($($arg)*) }
    };
}

#[macro_export]
macro_rules! raise_reference_error {
    ($($arg:tt)*) => {
        $crate::JSError::ReferenceError { message: format!($($arg)*) }
    };
}

#[macro_export]
macro_rules! raise_range_error {
    ($($arg:tt)*) => {
        $crate::JSError::RangeError { message: format!($($arg)*) }
    };
}

#[macro_export]
macro_rules! raise_unsupported {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        log::warn!("unsupported: {message}");
        $crate::JSError::Unsupported { message }
    }};
}

#[macro_export]
macro_rules! raise_side_effect {
    ($($arg:tt)*) => {
        $crate::JSError::PossibleSideEffect { message: format!($($arg)*) }
    };
}

#[macro_export]
macro_rules! raise_internal_error {
    ($($arg:tt)*) => {
        $crate::JSError::Internal { message: format!("{} ({}:{})", format!($($arg)*), file!(), line!()) }
    };
}

/// Syntax error at a token or node span.
#[macro_export]
macro_rules! raise_syntax_error {
    ($span:expr, $($arg:tt)*) => {
        $crate::JSError::SyntaxError { message: format!($($arg)*), line: $span.line, column: $span.column }
    };
}
