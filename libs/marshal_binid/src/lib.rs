//! # Binary-id wire codec
//!
//! Compact binary realization of the marshalling event protocol from
//! [`marshal_core`]. Structured data is encoded as tagged fields with
//! property names routed through an external name ↔ numeric-id
//! mapping (the [`SymbolTable`]), so the bytes carry small integers
//! instead of strings.
//!
//! The wire building blocks are:
//!
//! - `tag`: an unsigned varint packing a field id and a 3-bit wire
//!   type. Wire types 0 through 5 match the protocol-buffers
//!   convention (varint, fixed64, length-delimited, start group, end
//!   group, fixed32); 6 marks the start of an array and 7 an explicit
//!   null. Group framing and array run packing are extensions of this
//!   format and not protobuf-standard.
//! - `varint`/`zigzag`: LEB128 integers, with the zigzag remapping for
//!   signed values.
//! - `group framing`: objects are delimited by start/end group tags
//!   with no length prefix, which keeps the format streamable without
//!   lookahead. The outermost object is unwrapped by default and ends
//!   with the input.
//! - `runs`: consecutive same-wire-type scalars inside an array are
//!   batched under a single tag whose field slot carries the item
//!   count, followed by that many untagged values.
//! - `null`: an omitted object property (the default), an explicit
//!   null tag (wire type 7) when the writer is configured for it, or
//!   a single zero byte inside arrays where position is load-bearing.

pub mod codec;
mod leb128;
pub mod read;
pub mod reader;
pub mod symbol;
pub mod tag;
pub mod writer;

pub use codec::{from_slice, read_tree, table_for_tree, to_vec, write_tree};
pub use read::{IoRead, Read, SliceRead};
pub use reader::{Reader, ReaderOptions};
pub use symbol::provider::{
    FixedResolver, IdentityResolver, MappingProvider, TableResolver, TypeKey,
};
pub use symbol::{RESERVED_ID, RESERVED_NAME, SymbolTable};
pub use writer::{Writer, WriterOptions};
