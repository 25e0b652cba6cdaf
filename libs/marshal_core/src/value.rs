//! Scalar and tree value model carried by the event contract.

/// Kind selector for [`Scalar`] values, used to direct decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Str,
    Bytes,
    BigInt,
    BigDecimal,
}

/// A single scalar value as carried by the event contract.
///
/// Arbitrary-precision numbers are carried as decimal text; the
/// formats encode them as text anyway for portability, so keeping the
/// text avoids pulling a big-number crate into every format.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Arbitrary-precision integer as decimal text.
    BigInt(Box<str>),
    /// Arbitrary-precision decimal as decimal text, optionally with a
    /// fraction and exponent.
    BigDecimal(Box<str>),
}

impl Scalar {
    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::I8(_) => ValueKind::I8,
            Self::I16(_) => ValueKind::I16,
            Self::I32(_) => ValueKind::I32,
            Self::I64(_) => ValueKind::I64,
            Self::F32(_) => ValueKind::F32,
            Self::F64(_) => ValueKind::F64,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::BigInt(_) => ValueKind::BigInt,
            Self::BigDecimal(_) => ValueKind::BigDecimal,
        }
    }
}

/// A complete value tree.
///
/// Mostly useful for tests and generic whole-document codecs; the
/// event contract itself only ever moves [`Scalar`] values and
/// container boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Shorthand for a null scalar.
    #[must_use]
    pub fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}
