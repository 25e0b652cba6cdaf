//! Format-agnostic structured-data marshalling core.
//!
//! Application code serializes and deserializes through a single
//! pull-based reader / push-based writer abstraction instead of
//! depending on any one format library. This crate holds the pieces
//! every format implementation shares:
//!
//! - [`ProtocolState`] and its transition-legality function, the
//!   single source of truth that rejects malformed call sequences
//!   before any bytes move,
//! - [`Node`](node::Node), the strictly nested frame stack both
//!   readers and writers track containers with,
//! - the [`Scalar`]/[`Value`] model carried by events,
//! - the [`EventReader`] and [`EventWriter`] traits, and
//! - the shared [`Error`] taxonomy.
//!
//! Concrete formats (binary, JSON, XML, ...) live in sibling crates
//! and must all satisfy the event contract identically.

mod error;
pub mod event;
pub mod node;
pub mod state;
pub mod value;

pub use error::{Error, Result};
pub use event::{EventReader, EventWriter};
pub use node::Node;
pub use state::{ContainerKind, ProtocolState};
pub use value::{Scalar, Value, ValueKind};
