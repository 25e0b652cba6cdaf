//! Whole-document convenience functions over the event traits.
//!
//! These drive an [`EventWriter`] or [`EventReader`] across a complete
//! [`Value`] tree. The wire cannot self-describe every kind, so
//! decoded scalars come back with the natural kind for their encoding:
//! all varints as `I64`, fixed payloads as `F32`/`F64`, and
//! length-delimited payloads as `Str`. Callers needing bools, bytes or
//! big numbers drive the reader themselves with
//! [`read_value_as`](EventReader::read_value_as).

use std::sync::Arc;

use marshal_core::{Error, EventReader, EventWriter, ProtocolState, Result, Value};

use crate::read::SliceRead;
use crate::reader::{Reader, ReaderOptions};
use crate::symbol::SymbolTable;
use crate::symbol::provider::TableResolver;
use crate::writer::{Writer, WriterOptions};

/// Drives `writer` over the whole tree and finishes the stream.
///
/// The schema hint only applies to the outermost object; nested
/// containers inherit per the format's rules.
pub fn write_tree<W: EventWriter>(
    writer: &mut W,
    value: &Value,
    hint: Option<W::SchemaHint>,
) -> Result<()> {
    write_node(writer, value, hint)?;
    writer.done()
}

fn write_node<W: EventWriter>(
    writer: &mut W,
    value: &Value,
    hint: Option<W::SchemaHint>,
) -> Result<()> {
    match value {
        Value::Scalar(scalar) => writer.write_value(scalar),
        Value::Array(items) => {
            writer.start_array()?;
            for item in items {
                write_node(writer, item, None)?;
            }
            writer.end()
        }
        Value::Object(properties) => {
            writer.start_object(hint)?;
            for (name, value) in properties {
                writer.write_name(name)?;
                write_node(writer, value, None)?;
            }
            writer.end()
        }
    }
}

/// Pulls one whole tree out of `reader`, consuming the stream through
/// [`ProtocolState::Done`].
pub fn read_tree<R: EventReader>(reader: &mut R) -> Result<Value> {
    let state = reader.advance()?;
    let value = read_node(reader, state)?;
    let state = reader.advance()?;
    if state.is_done() {
        Ok(value)
    } else {
        Err(Error::protocol(state, ProtocolState::Done, None))
    }
}

fn read_node<R: EventReader>(reader: &mut R, state: ProtocolState) -> Result<Value> {
    match state {
        ProtocolState::Value => Ok(Value::Scalar(reader.read_value()?)),
        ProtocolState::StartObject => {
            let mut properties = Vec::new();
            loop {
                match reader.advance()? {
                    ProtocolState::Name => {
                        let name = reader.read_name()?.to_owned();
                        let state = reader.advance()?;
                        properties.push((name, read_node(reader, state)?));
                    }
                    ProtocolState::EndObject => return Ok(Value::Object(properties)),
                    state => {
                        return Err(Error::protocol(state, ProtocolState::EndObject, None));
                    }
                }
            }
        }
        ProtocolState::StartArray => {
            let mut items = Vec::new();
            loop {
                match reader.advance()? {
                    ProtocolState::EndArray => return Ok(Value::Array(items)),
                    state => items.push(read_node(reader, state)?),
                }
            }
        }
        state => Err(Error::protocol(state, ProtocolState::Value, None)),
    }
}

/// Encodes a tree to bytes with the binary-id writer.
pub fn to_vec(
    value: &Value,
    table: Option<Arc<SymbolTable>>,
    options: WriterOptions,
) -> Result<Vec<u8>> {
    let mut writer = Writer::with_options(Vec::new(), options);
    write_tree(&mut writer, value, table)?;
    Ok(writer.into_inner())
}

/// Decodes a tree from bytes with the binary-id reader.
pub fn from_slice<T: TableResolver>(
    bytes: &[u8],
    resolver: T,
    options: ReaderOptions,
) -> Result<Value> {
    let mut reader = Reader::with_options(SliceRead::new(bytes), resolver, options);
    read_tree(&mut reader)
}

/// Builds one symbol table covering every property name in the tree,
/// for callers that want a shared schema without writing one by hand.
pub fn table_for_tree(value: &Value) -> Result<SymbolTable> {
    fn collect(value: &Value, table: &mut SymbolTable) -> Result<()> {
        match value {
            Value::Scalar(_) => Ok(()),
            Value::Array(items) => {
                for item in items {
                    collect(item, table)?;
                }
                Ok(())
            }
            Value::Object(properties) => {
                for (name, value) in properties {
                    table.add(name)?;
                    collect(value, table)?;
                }
                Ok(())
            }
        }
    }

    let mut table = SymbolTable::new();
    collect(value, &mut table)?;
    Ok(table)
}
