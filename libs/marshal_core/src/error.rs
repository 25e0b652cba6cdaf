//! Error handling types.
//!
//! The whole framework shares one error type across formats, so the
//! event contract fails identically no matter which implementation is
//! behind it. None of these conditions are recovered internally: every
//! error aborts the current operation and leaves the stream in an
//! undefined state that must not be reused.

use std::io;

use crate::state::ProtocolState;
use crate::value::ValueKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Potential errors to encounter when reading or writing event streams.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The error originated from the underlying byte sink or source.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// An event was requested or emitted out of order.
    ///
    /// Raised before any bytes are produced or consumed for the
    /// offending event.
    #[error("illegal state transition from {from:?} to {to:?} (property: {name:?})")]
    ProtocolViolation {
        from: ProtocolState,
        to: ProtocolState,
        /// The active property name, when one was set.
        name: Option<Box<str>>,
    },

    /// A property name has no id binding in the active symbol table.
    ///
    /// Signals a schema mismatch between writer and table.
    #[error("no id bound for property name {name:?}")]
    UnknownName { name: Box<str> },

    /// A wire field id has no name binding in the active symbol table.
    ///
    /// There is no unknown-field escape hatch at this layer; schema
    /// evolution is the caller's responsibility.
    #[error("no name bound for field id {id}")]
    UnknownFieldId { id: u64 },

    /// Tried to rebind the reserved discriminator id or name, or to
    /// bind the non-id 0.
    #[error("cannot rebind reserved discriminator (id {id}, name {name:?})")]
    ReservedIdConflict { id: u32, name: Box<str> },

    /// Tried to bind a name or id that is already bound.
    ///
    /// Expected and recoverable while a schema is being constructed;
    /// the table is left unchanged.
    #[error("symbol {name:?} or id {id} is already bound")]
    DuplicateBinding { id: u32, name: Box<str> },

    /// The input bytes are not a valid encoding.
    ///
    /// The input must not be trusted past this point.
    #[error("malformed wire value at byte {offset}: {reason}")]
    MalformedWireValue { offset: u64, reason: String },

    /// The value kind, or this particular value of it, has no
    /// representation in the active format.
    #[error("value kind {kind:?} has no wire representation")]
    UnsupportedValue { kind: ValueKind },
}

impl Error {
    /// Creates an [`Error::ProtocolViolation`] for a rejected target
    /// state.
    #[must_use]
    pub fn protocol(from: ProtocolState, to: ProtocolState, name: Option<&str>) -> Self {
        Self::ProtocolViolation {
            from,
            to,
            name: name.map(Box::from),
        }
    }

    /// Creates an [`Error::MalformedWireValue`] at the given byte
    /// offset.
    #[must_use]
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Self::MalformedWireValue {
            offset,
            reason: reason.into(),
        }
    }
}
