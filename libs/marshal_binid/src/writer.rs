//! Push writer producing the binary-id wire format.

use std::io;
use std::sync::Arc;

use marshal_core::{ContainerKind, Error, EventWriter, Node, ProtocolState, Result, Scalar};
use smallvec::SmallVec;

use crate::leb128;
use crate::read::to_u64;
use crate::symbol::SymbolTable;
use crate::tag::{Tag, WireType};

/// Behavioral knobs for [`Writer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriterOptions {
    /// Write object-property nulls as explicit null tags instead of
    /// omitting the property.
    pub explicit_nulls: bool,
    /// Always wrap the outermost object in a field-0 group.
    ///
    /// Off by default: the unwrapped root saves the framing bytes and
    /// ends with the output. Root scalars and root arrays are tagged
    /// regardless, since without a tag they would be unreadable.
    pub wrap_root: bool,
}

/// Per-frame writer bookkeeping.
#[derive(Debug, Default)]
struct WriteFrame {
    /// Name ↔ id table for this frame's properties. `None` routes
    /// through the writer's self-building table.
    table: Option<Arc<SymbolTable>>,
    /// Field id resolved by the last `write_name`.
    field: u64,
    /// Whether `end` must emit an end-group tag.
    framed: bool,
    /// Scalar run being buffered; only used by array frames.
    run: Run,
}

/// A batch of consecutive same-wire-type array scalars, held back so
/// they can be emitted under a single count-carrying tag.
#[derive(Debug, Default)]
struct Run {
    wire: Option<WireType>,
    count: u64,
    buf: SmallVec<[u8; 64]>,
}

/// Push-based [`EventWriter`] emitting the binary-id format into any
/// [`io::Write`] sink.
///
/// Every call validates the state transition first and fails with
/// [`Error::ProtocolViolation`] before a single byte is written, so a
/// rejected call leaves the sink clean.
///
/// Property names resolve through the innermost schema hint passed to
/// [`start_object`](EventWriter::start_object); nested containers
/// inherit the enclosing table unless they bring their own hint. A
/// writer driven without any hint builds a [`SymbolTable`] on the fly
/// with auto-assigned ids, recoverable through
/// [`into_parts`](Self::into_parts) for the reading side.
#[derive(Debug)]
pub struct Writer<W> {
    out: W,
    state: ProtocolState,
    frame: Node<WriteFrame>,
    /// Self-building table shared by every frame without a hint.
    building: Option<SymbolTable>,
    options: WriterOptions,
}

impl<W: io::Write> Writer<W> {
    /// Creates a writer with default options.
    pub fn new(out: W) -> Self {
        Self::with_options(out, WriterOptions::default())
    }

    pub fn with_options(out: W, options: WriterOptions) -> Self {
        Self {
            out,
            state: ProtocolState::Null,
            frame: Node::root(WriteFrame::default()),
            building: None,
            options,
        }
    }

    /// Unwraps into the sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Unwraps into the sink and the self-built symbol table, if the
    /// writer was driven without schema hints.
    pub fn into_parts(self) -> (W, Option<SymbolTable>) {
        (self.out, self.building)
    }

    fn check(&self, target: ProtocolState) -> Result<()> {
        if self.state.is_valid_transition(target, self.frame.kind()) {
            Ok(())
        } else {
            Err(Error::protocol(self.state, target, self.frame.name()))
        }
    }

    /// Resolves `name` through the current frame's table, or learns it
    /// in the self-building table.
    fn resolve_name(&mut self, name: &str) -> Result<u64> {
        match self.frame.context().table.as_deref() {
            Some(table) => match table.id_of(name) {
                Some(id) => Ok(u64::from(id)),
                None => Err(Error::UnknownName { name: name.into() }),
            },
            None => {
                let table = self.building.get_or_insert_with(SymbolTable::new);
                Ok(u64::from(table.add(name)?))
            }
        }
    }

    /// Emits the buffered array run, if any, as one count-carrying tag
    /// followed by the untagged payloads.
    fn flush_run(&mut self) -> Result<()> {
        let run = &mut self.frame.context_mut().run;
        let Some(wire) = run.wire.take() else {
            return Ok(());
        };
        Tag::new(run.count, wire).write(&mut self.out)?;
        self.out.write_all(&run.buf)?;
        run.count = 0;
        run.buf.clear();
        Ok(())
    }

    /// Emits the tag opening a container of wire type `wire` in the
    /// current position, and reports whether a matching end-group tag
    /// will be owed.
    fn open_container(&mut self, wire: WireType) -> Result<bool> {
        match self.frame.kind() {
            ContainerKind::Object => {
                let field = self.frame.context().field;
                Tag::new(field, wire).write(&mut self.out)?;
                Ok(true)
            }
            ContainerKind::Array => {
                self.flush_run()?;
                Tag::new(0, wire).write(&mut self.out)?;
                Ok(true)
            }
            ContainerKind::None => {
                // the unwrapped root object has no framing at all;
                // everything else at the root keeps its tag
                if self.options.wrap_root || wire != WireType::StartGroup {
                    Tag::new(0, wire).write(&mut self.out)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn push_frame(&mut self, kind: ContainerKind, hint: Option<Arc<SymbolTable>>, framed: bool) {
        let table = hint.or_else(|| self.frame.context().table.clone());
        let frame = std::mem::replace(&mut self.frame, Node::root(WriteFrame::default()));
        self.frame = frame.push(
            kind,
            WriteFrame {
                table,
                field: 0,
                framed,
                run: Run::default(),
            },
        );
    }
}

fn wire_of(value: &Scalar) -> Option<WireType> {
    match value {
        Scalar::Null => None,
        Scalar::Bool(_) | Scalar::I8(_) | Scalar::I16(_) | Scalar::I32(_) | Scalar::I64(_) => {
            Some(WireType::Varint)
        }
        Scalar::F32(_) => Some(WireType::Fixed32),
        Scalar::F64(_) => Some(WireType::Fixed64),
        Scalar::Str(_) | Scalar::Bytes(_) | Scalar::BigInt(_) | Scalar::BigDecimal(_) => {
            Some(WireType::LengthDelimited)
        }
    }
}

/// Writes the untagged payload of a non-null scalar.
fn write_payload<W: io::Write>(out: &mut W, value: &Scalar) -> Result<()> {
    fn chunk<W: io::Write>(out: &mut W, bytes: &[u8]) -> Result<()> {
        leb128::write_uint(out, to_u64(bytes.len()))?;
        out.write_all(bytes)?;
        Ok(())
    }

    match value {
        Scalar::Null => Ok(()),
        Scalar::Bool(b) => leb128::write_uint(out, u64::from(*b)).map(drop),
        Scalar::I8(x) => leb128::write_sint(out, i64::from(*x)).map(drop),
        Scalar::I16(x) => leb128::write_sint(out, i64::from(*x)).map(drop),
        Scalar::I32(x) => leb128::write_sint(out, i64::from(*x)).map(drop),
        Scalar::I64(x) => leb128::write_sint(out, *x).map(drop),
        Scalar::F32(x) => Ok(out.write_all(&x.to_le_bytes())?),
        Scalar::F64(x) => Ok(out.write_all(&x.to_le_bytes())?),
        Scalar::Str(s) => chunk(out, s.as_bytes()),
        Scalar::Bytes(b) => chunk(out, b),
        Scalar::BigInt(s) | Scalar::BigDecimal(s) => chunk(out, s.as_bytes()),
    }
}

impl<W: io::Write> EventWriter for Writer<W> {
    type SchemaHint = Arc<SymbolTable>;

    fn current_state(&self) -> ProtocolState {
        self.state
    }

    fn start_object(&mut self, hint: Option<Self::SchemaHint>) -> Result<()> {
        self.check(ProtocolState::StartObject)?;
        let framed = self.open_container(WireType::StartGroup)?;
        self.frame.bump();
        self.push_frame(ContainerKind::Object, hint, framed);
        self.state = ProtocolState::StartObject;
        Ok(())
    }

    fn start_array(&mut self) -> Result<()> {
        self.check(ProtocolState::StartArray)?;
        let framed = self.open_container(WireType::ArrayMarker)?;
        self.frame.bump();
        self.push_frame(ContainerKind::Array, None, framed);
        self.state = ProtocolState::StartArray;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let target = match self.frame.kind() {
            ContainerKind::Object | ContainerKind::None => ProtocolState::EndObject,
            ContainerKind::Array => ProtocolState::EndArray,
        };
        self.check(target)?;

        if self.frame.kind() == ContainerKind::Array {
            self.flush_run()?;
        }
        if self.frame.context().framed {
            Tag::new(0, WireType::EndGroup).write(&mut self.out)?;
        }

        let frame = std::mem::replace(&mut self.frame, Node::root(WriteFrame::default()));
        let (parent, _) = frame.pop();
        // the root frame cannot reach here: `check` rejected the
        // transition already
        if let Some(parent) = parent {
            self.frame = parent;
        }
        self.state = target;
        Ok(())
    }

    fn write_name(&mut self, name: &str) -> Result<()> {
        self.check(ProtocolState::Name)?;
        let field = self.resolve_name(name)?;
        let ctx = self.frame.context_mut();
        ctx.field = field;
        self.frame.set_name(name);
        self.state = ProtocolState::Name;
        Ok(())
    }

    fn write_value(&mut self, value: &Scalar) -> Result<()> {
        self.check(ProtocolState::Value)?;

        match self.frame.kind() {
            ContainerKind::Object => match wire_of(value) {
                Some(wire) => {
                    let field = self.frame.context().field;
                    Tag::new(field, wire).write(&mut self.out)?;
                    write_payload(&mut self.out, value)?;
                }
                // absent by default; an explicit null tag on request
                None if self.options.explicit_nulls => {
                    let field = self.frame.context().field;
                    Tag::new(field, WireType::Null).write(&mut self.out)?;
                }
                None => {}
            },
            ContainerKind::Array => match wire_of(value) {
                Some(wire) => {
                    if self.frame.context().run.wire.is_some_and(|open| open != wire) {
                        self.flush_run()?;
                    }
                    let run = &mut self.frame.context_mut().run;
                    run.wire = Some(wire);
                    run.count += 1;
                    write_payload(&mut run.buf, value)?;
                }
                None => {
                    // position is load-bearing in arrays, so null is a
                    // real element: the reserved zero byte
                    self.flush_run()?;
                    self.out.write_all(&[0])?;
                }
            },
            ContainerKind::None => match wire_of(value) {
                Some(wire) => {
                    Tag::new(0, wire).write(&mut self.out)?;
                    write_payload(&mut self.out, value)?;
                }
                None => {
                    Tag::new(0, WireType::Null).write(&mut self.out)?;
                }
            },
        }

        self.frame.bump();
        self.state = ProtocolState::Value;
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        self.check(ProtocolState::Done)?;
        self.out.flush()?;
        self.state = ProtocolState::Done;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(pairs: &[(u32, &str)]) -> Arc<SymbolTable> {
        let mut table = SymbolTable::new();
        for &(id, name) in pairs {
            table.bind(id, name).expect("fresh binding works");
        }
        table.seal()
    }

    #[test]
    fn unwrapped_object_has_no_framing() {
        let table = schema(&[(2, "a"), (3, "b")]);
        let mut writer = Writer::new(Vec::new());
        writer.start_object(Some(table)).expect("root object");
        writer.write_name("a").expect("known name");
        writer.write_value(&Scalar::I64(1)).expect("value fits");
        writer.write_name("b").expect("known name");
        writer.write_value(&Scalar::I64(-1)).expect("value fits");
        writer.end().expect("object closes");
        writer.done().expect("stream finishes");

        // tag(2, varint) zz(1), tag(3, varint) zz(-1); no group tags
        assert_eq!(writer.into_inner(), [0x10, 0x02, 0x18, 0x01]);
    }

    #[test]
    fn wrapped_root_carries_group_tags() {
        let table = schema(&[(2, "a")]);
        let options = WriterOptions {
            wrap_root: true,
            ..WriterOptions::default()
        };
        let mut writer = Writer::with_options(Vec::new(), options);
        writer.start_object(Some(table)).expect("root object");
        writer.write_name("a").expect("known name");
        writer.write_value(&Scalar::Bool(true)).expect("value fits");
        writer.end().expect("object closes");
        writer.done().expect("stream finishes");

        // tag(0, start group), tag(2, varint) 1, tag(0, end group)
        assert_eq!(writer.into_inner(), [0x03, 0x10, 0x01, 0x04]);
    }

    #[test]
    fn null_properties_are_omitted_by_default() {
        let table = schema(&[(2, "a"), (3, "b")]);
        let mut writer = Writer::new(Vec::new());
        writer.start_object(Some(table)).expect("root object");
        writer.write_name("a").expect("known name");
        writer.write_value(&Scalar::Null).expect("null is a value");
        writer.write_name("b").expect("known name");
        writer.write_value(&Scalar::I64(1)).expect("value fits");
        writer.end().expect("object closes");
        writer.done().expect("stream finishes");

        assert_eq!(writer.into_inner(), [0x18, 0x02], "only b made it out");
    }

    #[test]
    fn explicit_nulls_write_a_null_tag() {
        let table = schema(&[(2, "a"), (3, "b")]);
        let options = WriterOptions {
            explicit_nulls: true,
            ..WriterOptions::default()
        };
        let mut writer = Writer::with_options(Vec::new(), options);
        writer.start_object(Some(table)).expect("root object");
        writer.write_name("a").expect("known name");
        writer.write_value(&Scalar::Null).expect("null is a value");
        writer.write_name("b").expect("known name");
        writer.write_value(&Scalar::I64(1)).expect("value fits");
        writer.end().expect("object closes");
        writer.done().expect("stream finishes");

        // tag(2, null) precedes b this time
        assert_eq!(writer.into_inner(), [0x17, 0x18, 0x02]);
    }

    #[test]
    fn array_scalars_batch_into_runs() {
        let options = WriterOptions {
            wrap_root: true,
            ..WriterOptions::default()
        };
        let mut writer = Writer::with_options(Vec::new(), options);
        writer.start_array().expect("root array");
        for x in [1, 1, 1] {
            writer.write_value(&Scalar::I64(x)).expect("value fits");
        }
        writer
            .write_value(&Scalar::Str("x".to_owned()))
            .expect("value fits");
        writer.write_value(&Scalar::I64(2)).expect("value fits");
        writer.end().expect("array closes");
        writer.done().expect("stream finishes");

        // three runs: 3 varints, 1 string, 1 varint
        assert_eq!(
            writer.into_inner(),
            [0x06, 0x18, 0x02, 0x02, 0x02, 0x0A, 0x01, 0x78, 0x08, 0x04, 0x04]
        );
    }

    #[test]
    fn array_null_flushes_the_run_and_writes_a_zero_byte() {
        let options = WriterOptions {
            wrap_root: true,
            ..WriterOptions::default()
        };
        let mut writer = Writer::with_options(Vec::new(), options);
        writer.start_array().expect("root array");
        writer.write_value(&Scalar::I64(1)).expect("value fits");
        writer.write_value(&Scalar::Null).expect("null is a value");
        writer.write_value(&Scalar::I64(1)).expect("value fits");
        writer.end().expect("array closes");
        writer.done().expect("stream finishes");

        // run of 1, zero byte, run of 1, end group
        assert_eq!(
            writer.into_inner(),
            [0x06, 0x08, 0x02, 0x00, 0x08, 0x02, 0x04]
        );
    }

    #[test]
    fn nested_container_flushes_the_run() {
        let options = WriterOptions {
            wrap_root: true,
            ..WriterOptions::default()
        };
        let mut writer = Writer::with_options(Vec::new(), options);
        writer.start_array().expect("root array");
        writer.write_value(&Scalar::I64(1)).expect("value fits");
        writer.start_array().expect("nested array");
        writer.write_value(&Scalar::I64(2)).expect("value fits");
        writer.end().expect("inner closes");
        writer.end().expect("outer closes");
        writer.done().expect("stream finishes");

        assert_eq!(
            writer.into_inner(),
            [0x06, 0x08, 0x02, 0x06, 0x08, 0x04, 0x04, 0x04]
        );
    }

    #[test]
    fn violations_emit_no_bytes() {
        let mut writer = Writer::new(Vec::new());
        writer.start_object(None).expect("root object");

        // a value without a preceding name is out of order
        let err = writer
            .write_value(&Scalar::I64(1))
            .expect_err("value before name must fail");
        assert!(matches!(err, Error::ProtocolViolation { .. }), "got {err:?}");
        // ending the object as an array is out of order too
        let err = writer.start_array().expect_err("array needs a name here");
        assert!(matches!(err, Error::ProtocolViolation { .. }), "got {err:?}");

        assert!(
            writer.into_inner().is_empty(),
            "rejected calls left the sink clean"
        );
    }

    #[test]
    fn sealed_table_rejects_unknown_names() {
        let table = schema(&[(2, "a")]);
        let mut writer = Writer::new(Vec::new());
        writer.start_object(Some(table)).expect("root object");
        let err = writer.write_name("missing").expect_err("name is unbound");
        assert!(matches!(err, Error::UnknownName { .. }), "got {err:?}");
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn schemaless_writer_builds_a_table() {
        let mut writer = Writer::new(Vec::new());
        writer.start_object(None).expect("root object");
        writer.write_name("first").expect("names are learned");
        writer.write_value(&Scalar::I64(1)).expect("value fits");
        writer.write_name("second").expect("names are learned");
        writer.write_value(&Scalar::I64(2)).expect("value fits");
        writer.write_name("first").expect("known name reuses its id");
        writer.write_value(&Scalar::I64(3)).expect("value fits");
        writer.end().expect("object closes");
        writer.done().expect("stream finishes");

        let (bytes, table) = writer.into_parts();
        let table = table.expect("a table was built");
        assert_eq!(table.id_of("first"), Some(2));
        assert_eq!(table.id_of("second"), Some(3));
        // tag(2) 1, tag(3) 2, tag(2) 3
        assert_eq!(bytes, [0x10, 0x02, 0x18, 0x04, 0x10, 0x06]);
    }

    #[test]
    fn nested_objects_inherit_the_enclosing_table() {
        let table = schema(&[(2, "child"), (3, "x")]);
        let mut writer = Writer::new(Vec::new());
        writer.start_object(Some(table)).expect("root object");
        writer.write_name("child").expect("known name");
        writer.start_object(None).expect("nested object");
        writer.write_name("x").expect("inherited table knows x");
        writer.write_value(&Scalar::I64(1)).expect("value fits");
        writer.end().expect("nested closes");
        writer.end().expect("root closes");
        writer.done().expect("stream finishes");

        // tag(2, start group), tag(3, varint) 2, tag(0, end group)
        assert_eq!(writer.into_inner(), [0x13, 0x18, 0x02, 0x04]);
    }

    #[test]
    fn done_requires_a_closed_root() {
        let mut writer = Writer::new(Vec::new());
        writer.start_object(None).expect("root object");
        let err = writer.done().expect_err("the object is still open");
        assert!(matches!(err, Error::ProtocolViolation { .. }), "got {err:?}");
    }

    #[test]
    fn scalar_payload_encodings() {
        fn payload(value: &Scalar) -> Vec<u8> {
            let mut buf = Vec::new();
            write_payload(&mut buf, value).expect("encoding to a vec works");
            buf
        }

        assert_eq!(payload(&Scalar::Bool(false)), [0x00]);
        assert_eq!(payload(&Scalar::Bool(true)), [0x01]);
        assert_eq!(payload(&Scalar::I8(-1)), [0x01]);
        assert_eq!(payload(&Scalar::I32(150)), [0xAC, 0x02]);
        assert_eq!(payload(&Scalar::F32(1.0)), 1.0f32.to_le_bytes());
        assert_eq!(payload(&Scalar::F64(-2.5)), (-2.5f64).to_le_bytes());
        assert_eq!(payload(&Scalar::Str("hi".to_owned())), [0x02, b'h', b'i']);
        assert_eq!(payload(&Scalar::Bytes(vec![0xFF])), [0x01, 0xFF]);
        assert_eq!(
            payload(&Scalar::BigInt("123456789012345678901".into())),
            {
                let mut expected = vec![21u8];
                expected.extend_from_slice(b"123456789012345678901");
                expected
            }
        );
    }
}
