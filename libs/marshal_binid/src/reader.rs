//! Pull reader reconstructing the event stream from bytes.

use std::sync::Arc;

use marshal_core::{
    ContainerKind, Error, EventReader, Node, ProtocolState, Result, Scalar, ValueKind,
};

use crate::leb128;
use crate::read::Read;
use crate::symbol::provider::{IdentityResolver, TableResolver};
use crate::symbol::{RESERVED_NAME, SymbolTable};
use crate::tag::{Tag, WireType};

/// Behavioral knobs for [`Reader`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Expect the outermost value to be wrapped in a field-0 tag.
    ///
    /// Must match the writing side: off, the input is an unwrapped
    /// object ending with the input itself.
    pub wrap_root: bool,
}

/// Per-frame reader bookkeeping.
#[derive(Debug)]
struct ReadFrame {
    table: Arc<SymbolTable>,
    /// Whether this container ends with an end-group tag rather than
    /// the end of input.
    framed: bool,
    /// Wire type and remaining item count of the scalar run being
    /// replayed; the count is always positive.
    run: Option<(WireType, u64)>,
}

/// What follows a just-decoded property name.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Scalar(WireType),
    Null,
    Object,
    Array,
}

/// A decoded wire payload, not yet interpreted as any particular
/// value kind.
#[derive(Debug)]
enum RawValue {
    Null,
    Varint(u64),
    Fixed32([u8; 4]),
    Fixed64([u8; 8]),
    Chunk(Vec<u8>),
}

/// Pull-based [`EventReader`] decoding the binary-id format from any
/// [`Read`] source.
///
/// The byte stream does not carry property names, so the reader routes
/// every field id through a [`SymbolTable`] supplied by the
/// [`TableResolver`]: the root hook picks the outermost table, the
/// nested hook may swap tables when descending into a property, and
/// the type-tag hook re-resolves the current table after the reserved
/// discriminator property is read.
#[derive(Debug)]
pub struct Reader<R, T = IdentityResolver> {
    src: R,
    resolver: T,
    options: ReaderOptions,
    state: ProtocolState,
    frame: Node<ReadFrame>,
    pending: Option<Pending>,
    value: Option<RawValue>,
    /// Byte offset where the current raw value started.
    value_at: u64,
}

fn orphan_frame() -> Node<ReadFrame> {
    Node::root(ReadFrame {
        table: Arc::clone(SymbolTable::empty()),
        framed: false,
        run: None,
    })
}

impl<R: Read> Reader<R> {
    /// Creates a reader resolving every table to the identity table.
    pub fn new(src: R) -> Self {
        Self::with_resolver(src, IdentityResolver)
    }
}

impl<R: Read, T: TableResolver> Reader<R, T> {
    pub fn with_resolver(src: R, resolver: T) -> Self {
        Self::with_options(src, resolver, ReaderOptions::default())
    }

    pub fn with_options(src: R, resolver: T, options: ReaderOptions) -> Self {
        let root = ReadFrame {
            table: resolver.root(),
            framed: false,
            run: None,
        };
        Self {
            src,
            resolver,
            options,
            state: ProtocolState::Null,
            frame: Node::root(root),
            pending: None,
            value: None,
            value_at: 0,
        }
    }

    /// Unwraps into the byte source.
    pub fn into_inner(self) -> R {
        self.src
    }

    /// Resolves the field id of a just-read property tag and records
    /// the name in the current frame.
    fn begin_property(&mut self, field: u64) -> Result<()> {
        let id = u32::try_from(field).map_err(|_| Error::UnknownFieldId { id: field })?;
        let name = self
            .frame
            .context()
            .table
            .name_of(id)
            .ok_or(Error::UnknownFieldId { id: field })?;
        self.frame.set_name(&name);
        Ok(())
    }

    /// Pushes the frame for a container starting in the current
    /// position, resolving its table through the nested hook when the
    /// container sits under an object property.
    fn push_child(&mut self, kind: ContainerKind, framed: bool) {
        let parent = Arc::clone(&self.frame.context().table);
        let table = match self.frame.name() {
            Some(name) if self.frame.kind() == ContainerKind::Object => self
                .resolver
                .nested(&parent, name)
                .unwrap_or(parent),
            _ => parent,
        };
        let frame = std::mem::replace(&mut self.frame, orphan_frame());
        self.frame = frame.push(
            kind,
            ReadFrame {
                table,
                framed,
                run: None,
            },
        );
    }

    fn pop(&mut self, target: ProtocolState) -> Result<ProtocolState> {
        let frame = std::mem::replace(&mut self.frame, orphan_frame());
        let (parent, _) = frame.pop();
        match parent {
            Some(parent) => {
                self.frame = parent;
                Ok(target)
            }
            None => Err(Error::malformed(self.src.position(), "unbalanced end")),
        }
    }

    /// Reads the untagged payload for `wire` into the raw value slot.
    fn read_raw(&mut self, wire: WireType) -> Result<()> {
        self.value_at = self.src.position();
        let raw = match wire {
            WireType::Varint => RawValue::Varint(leb128::read_uint(&mut self.src)?),
            WireType::Fixed32 => RawValue::Fixed32(self.src.read_bytes()?),
            WireType::Fixed64 => RawValue::Fixed64(self.src.read_bytes()?),
            WireType::LengthDelimited => {
                let len = leb128::read_uint(&mut self.src)?;
                let len = usize::try_from(len)
                    .map_err(|_| Error::malformed(self.value_at, "length overflows usize"))?;
                RawValue::Chunk(self.src.read_byte_vec(len)?)
            }
            _ => {
                return Err(Error::malformed(
                    self.value_at,
                    format!("wire type {wire:?} has no payload"),
                ));
            }
        };
        self.value = Some(raw);
        Ok(())
    }

    fn advance_at_start(&mut self) -> Result<ProtocolState> {
        if !self.options.wrap_root {
            // the unwrapped root is an object by definition and has no
            // framing to consume
            self.push_child(ContainerKind::Object, false);
            return Ok(ProtocolState::StartObject);
        }

        let Some(tag) = Tag::read_opt(&mut self.src)? else {
            return Err(Error::malformed(0, "empty input"));
        };
        if tag.field != 0 {
            return Err(Error::malformed(0, "root tag carries a field id"));
        }
        match tag.wire {
            WireType::StartGroup => {
                self.push_child(ContainerKind::Object, true);
                Ok(ProtocolState::StartObject)
            }
            WireType::ArrayMarker => {
                self.push_child(ContainerKind::Array, true);
                Ok(ProtocolState::StartArray)
            }
            WireType::Null => {
                self.value = Some(RawValue::Null);
                Ok(ProtocolState::Value)
            }
            wire if wire.is_scalar() => {
                self.read_raw(wire)?;
                Ok(ProtocolState::Value)
            }
            WireType::EndGroup => Err(Error::malformed(0, "end-group before any start")),
            // is_scalar covered everything else
            wire => Err(Error::malformed(0, format!("unexpected root wire type {wire:?}"))),
        }
    }

    fn advance_after_name(&mut self) -> Result<ProtocolState> {
        match self.pending.take() {
            Some(Pending::Scalar(wire)) => {
                self.read_raw(wire)?;
                Ok(ProtocolState::Value)
            }
            Some(Pending::Null) => {
                self.value = Some(RawValue::Null);
                Ok(ProtocolState::Value)
            }
            Some(Pending::Object) => {
                self.push_child(ContainerKind::Object, true);
                Ok(ProtocolState::StartObject)
            }
            Some(Pending::Array) => {
                self.push_child(ContainerKind::Array, true);
                Ok(ProtocolState::StartArray)
            }
            // the Name state is only ever entered with a pending slot
            None => Err(Error::protocol(
                self.state,
                ProtocolState::Value,
                self.frame.name(),
            )),
        }
    }

    fn advance_in_object(&mut self) -> Result<ProtocolState> {
        let at = self.src.position();
        let Some(tag) = Tag::read_opt(&mut self.src)? else {
            // only the unwrapped root object may end with the input
            if !self.frame.context().framed && self.frame.parent_kind() == ContainerKind::None {
                return self.pop(ProtocolState::EndObject);
            }
            return Err(Error::malformed(at, "input ended inside an object"));
        };

        match tag.wire {
            WireType::EndGroup => {
                if !self.frame.context().framed {
                    return Err(Error::malformed(at, "end-group in an unframed object"));
                }
                self.pop(ProtocolState::EndObject)
            }
            WireType::StartGroup => {
                self.begin_property(tag.field)?;
                self.pending = Some(Pending::Object);
                Ok(ProtocolState::Name)
            }
            WireType::ArrayMarker => {
                self.begin_property(tag.field)?;
                self.pending = Some(Pending::Array);
                Ok(ProtocolState::Name)
            }
            WireType::Null => {
                self.begin_property(tag.field)?;
                self.pending = Some(Pending::Null);
                Ok(ProtocolState::Name)
            }
            wire => {
                self.begin_property(tag.field)?;
                self.pending = Some(Pending::Scalar(wire));
                Ok(ProtocolState::Name)
            }
        }
    }

    fn advance_in_array(&mut self) -> Result<ProtocolState> {
        if let Some((wire, remaining)) = self.frame.context().run {
            self.read_raw(wire)?;
            self.frame.context_mut().run = (remaining > 1).then_some((wire, remaining - 1));
            return Ok(ProtocolState::Value);
        }

        let at = self.src.position();
        let Some(tag) = Tag::read_opt(&mut self.src)? else {
            return Err(Error::malformed(at, "input ended inside an array"));
        };

        match tag.wire {
            WireType::EndGroup => self.pop(ProtocolState::EndArray),
            WireType::StartGroup => {
                self.push_child(ContainerKind::Object, true);
                Ok(ProtocolState::StartObject)
            }
            WireType::ArrayMarker => {
                self.push_child(ContainerKind::Array, true);
                Ok(ProtocolState::StartArray)
            }
            WireType::Null => Err(Error::malformed(at, "null tag inside an array")),
            // a scalar tag in an array heads a run, with the item
            // count in the field slot; the bare zero byte is the null
            // element marker
            wire if tag.field == 0 => {
                if wire == WireType::Varint {
                    self.value = Some(RawValue::Null);
                    Ok(ProtocolState::Value)
                } else {
                    Err(Error::malformed(at, "scalar run with no items"))
                }
            }
            wire => {
                self.read_raw(wire)?;
                self.frame.context_mut().run = (tag.field > 1).then_some((wire, tag.field - 1));
                Ok(ProtocolState::Value)
            }
        }
    }

    fn advance_at_end(&mut self) -> Result<ProtocolState> {
        let at = self.src.position();
        match self.src.read_byte_opt()? {
            None => Ok(ProtocolState::Done),
            Some(_) => Err(Error::malformed(at, "trailing bytes after the root value")),
        }
    }

    /// Re-resolves the current table after reading the reserved
    /// discriminator property.
    fn apply_type_tag(&mut self, scalar: &Scalar) {
        if self.frame.kind() != ContainerKind::Object
            || self.frame.name() != Some(RESERVED_NAME)
        {
            return;
        }
        if let Scalar::Str(type_name) = scalar
            && let Some(table) = self.resolver.type_tag(type_name)
        {
            log::debug!("switching symbol table for type {type_name:?}");
            self.frame.context_mut().table = table;
        }
    }
}

/// Interprets a raw wire payload as the requested kind.
fn convert(raw: RawValue, kind: ValueKind, at: u64) -> Result<Scalar> {
    fn int<T>(v: u64, at: u64, name: &str) -> Result<T>
    where
        T: TryFrom<i64>,
    {
        T::try_from(leb128::unzigzag(v))
            .map_err(|_| Error::malformed(at, format!("integer overflows {name}")))
    }

    fn text(bytes: Vec<u8>, at: u64) -> Result<String> {
        String::from_utf8(bytes).map_err(|_| Error::malformed(at, "invalid utf-8 in text payload"))
    }

    // null stays null whatever kind was requested; the caller models
    // the absence, not the wire
    if let RawValue::Null = raw {
        return Ok(Scalar::Null);
    }

    match (kind, raw) {
        (ValueKind::Bool, RawValue::Varint(0)) => Ok(Scalar::Bool(false)),
        (ValueKind::Bool, RawValue::Varint(1)) => Ok(Scalar::Bool(true)),
        (ValueKind::Bool, RawValue::Varint(_)) => Err(Error::malformed(at, "boolean out of range")),
        (ValueKind::I8, RawValue::Varint(v)) => int(v, at, "i8").map(Scalar::I8),
        (ValueKind::I16, RawValue::Varint(v)) => int(v, at, "i16").map(Scalar::I16),
        (ValueKind::I32, RawValue::Varint(v)) => int(v, at, "i32").map(Scalar::I32),
        (ValueKind::I64, RawValue::Varint(v)) => Ok(Scalar::I64(leb128::unzigzag(v))),
        (ValueKind::F32, RawValue::Fixed32(b)) => Ok(Scalar::F32(f32::from_le_bytes(b))),
        (ValueKind::F64, RawValue::Fixed64(b)) => Ok(Scalar::F64(f64::from_le_bytes(b))),
        (ValueKind::Str, RawValue::Chunk(b)) => text(b, at).map(Scalar::Str),
        (ValueKind::Bytes, RawValue::Chunk(b)) => Ok(Scalar::Bytes(b)),
        (ValueKind::BigInt, RawValue::Chunk(b)) => {
            text(b, at).map(|s| Scalar::BigInt(s.into_boxed_str()))
        }
        (ValueKind::BigDecimal, RawValue::Chunk(b)) => {
            text(b, at).map(|s| Scalar::BigDecimal(s.into_boxed_str()))
        }
        (ValueKind::Null, _) => Err(Error::malformed(at, "expected a null value")),
        (kind, raw) => Err(Error::malformed(
            at,
            format!("wire value {raw:?} cannot be read as {kind:?}"),
        )),
    }
}

impl<R: Read, T: TableResolver> EventReader for Reader<R, T> {
    fn current_state(&self) -> ProtocolState {
        self.state
    }

    fn advance(&mut self) -> Result<ProtocolState> {
        let next = match self.state {
            ProtocolState::Done => {
                return Err(Error::protocol(self.state, ProtocolState::Done, None));
            }
            ProtocolState::Null => self.advance_at_start()?,
            ProtocolState::Name => self.advance_after_name()?,
            ProtocolState::StartObject
            | ProtocolState::StartArray
            | ProtocolState::Value
            | ProtocolState::EndObject
            | ProtocolState::EndArray => match self.frame.kind() {
                ContainerKind::Object => self.advance_in_object()?,
                ContainerKind::Array => self.advance_in_array()?,
                ContainerKind::None => self.advance_at_end()?,
            },
        };
        self.state = next;
        Ok(next)
    }

    fn read_name(&self) -> Result<&str> {
        self.frame
            .name()
            .ok_or_else(|| Error::protocol(self.state, ProtocolState::Name, None))
    }

    fn read_value_as(&mut self, kind: ValueKind) -> Result<Scalar> {
        if self.state != ProtocolState::Value {
            return Err(Error::protocol(
                self.state,
                ProtocolState::Value,
                self.frame.name(),
            ));
        }
        let raw = self.value.take().ok_or_else(|| {
            Error::protocol(self.state, ProtocolState::Value, self.frame.name())
        })?;
        let scalar = convert(raw, kind, self.value_at)?;
        self.apply_type_tag(&scalar);
        Ok(scalar)
    }

    fn read_value(&mut self) -> Result<Scalar> {
        let kind = match &self.value {
            Some(RawValue::Varint(_)) => ValueKind::I64,
            Some(RawValue::Fixed32(_)) => ValueKind::F32,
            Some(RawValue::Fixed64(_)) => ValueKind::F64,
            Some(RawValue::Chunk(_)) => ValueKind::Str,
            Some(RawValue::Null) | None => ValueKind::Null,
        };
        self.read_value_as(kind)
    }
}
