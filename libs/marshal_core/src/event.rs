//! The event contract satisfied by every format implementation.
//!
//! Writers are push-based: application code drives a strict call
//! sequence (start container, name, values, end). Readers are
//! pull-based: application code advances the stream one event at a
//! time and inspects the current state. Both sides must validate
//! every step against [`ProtocolState::is_valid_transition`] and fail
//! with [`Error::ProtocolViolation`](crate::Error::ProtocolViolation)
//! before any bytes move — never silently coerce.

use crate::error::Result;
use crate::state::ProtocolState;
use crate::value::{Scalar, ValueKind};

/// Push-based event writer.
pub trait EventWriter {
    /// Format-specific schema information accepted by
    /// [`start_object`](Self::start_object); `()` for formats that
    /// carry names inline.
    type SchemaHint;

    /// The state the last successful call left the stream in.
    fn current_state(&self) -> ProtocolState;

    /// Starts an object, optionally under a schema hint.
    fn start_object(&mut self, hint: Option<Self::SchemaHint>) -> Result<()>;

    /// Starts an array.
    fn start_array(&mut self) -> Result<()>;

    /// Ends the innermost open container.
    fn end(&mut self) -> Result<()>;

    /// Writes the name of the next object property.
    fn write_name(&mut self, name: &str) -> Result<()>;

    /// Writes one scalar value in the current position.
    fn write_value(&mut self, value: &Scalar) -> Result<()>;

    /// Finishes the stream, transitioning to
    /// [`ProtocolState::Done`] and flushing the sink.
    fn done(&mut self) -> Result<()>;
}

/// Pull-based event reader.
pub trait EventReader {
    /// The state of the event most recently produced by
    /// [`advance`](Self::advance).
    fn current_state(&self) -> ProtocolState;

    /// Advances to the next event and returns its state.
    fn advance(&mut self) -> Result<ProtocolState>;

    /// The property name of the current event.
    ///
    /// Valid in [`ProtocolState::Name`] and kept through the
    /// property's value events for context.
    fn read_name(&self) -> Result<&str>;

    /// Interprets the current [`ProtocolState::Value`] event as
    /// `kind`.
    ///
    /// This is how callers resolve encodings the wire cannot describe
    /// by itself (a varint may be a bool or any integer width; a
    /// length-delimited payload may be text, bytes, or a big number).
    fn read_value_as(&mut self, kind: ValueKind) -> Result<Scalar>;

    /// Reads the current [`ProtocolState::Value`] event with the
    /// format's most natural kind for its encoding.
    fn read_value(&mut self) -> Result<Scalar>;
}
