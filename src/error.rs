// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol error codes surfaced through callbacks.
use std::fmt;
use std::rc::Rc;

/// What went wrong, as reported to `on_error` callbacks together with a
/// diagnostic message.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Signature or policy validation failed.
    Validation,
    /// An interest was NACKed with no remaining delegation to fall back to.
    DataRetrievalFailure,
    /// An encrypted blob names an algorithm this pipeline cannot handle.
    UnsupportedEncryptionScheme,
    /// An encrypted blob is malformed, including D-KEY packets whose block
    /// count is not exactly two.
    InvalidEncryptedFormat,
    /// The consumer store has no entry for the requested key name.
    NoDecryptKey,
    /// A crypto primitive rejected its input.
    EncryptionFailure,
    /// Catch-all with diagnostic text.
    General,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Validation => "Validation",
            ErrorCode::DataRetrievalFailure => "DataRetrievalFailure",
            ErrorCode::UnsupportedEncryptionScheme => "UnsupportedEncryptionScheme",
            ErrorCode::InvalidEncryptedFormat => "InvalidEncryptedFormat",
            ErrorCode::NoDecryptKey => "NoDecryptKey",
            ErrorCode::EncryptionFailure => "EncryptionFailure",
            ErrorCode::General => "General",
        };
        write!(f, "{name}")
    }
}

/// Error callback shared across the stages of an operation.
pub type OnError = Rc<dyn Fn(ErrorCode, String)>;

/// Error callback that swallows every report.
pub fn noop_on_error() -> OnError {
    Rc::new(|_code, _message| {})
}
