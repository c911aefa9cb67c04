use snafu::Snafu;

/// A buffer that does not fit the layout it is decoded with.
///
/// These abort the decoding of the affected structure only. Unknown codes are never
/// errors; see [`EnumCodec`](crate::EnumCodec).
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    /// The buffer is shorter than a schema's fixed size.
    #[snafu(display("{schema} needs {needed} bytes, got {actual}"))]
    TruncatedBuffer {
        schema: &'static str,
        needed: usize,
        actual: usize,
    },
    /// A variable array extends past the bytes that hold it.
    #[snafu(display("{array} of {count} elements needs {needed} bytes, {available} available"))]
    TruncatedArray {
        array: &'static str,
        count: usize,
        needed: usize,
        available: usize,
    },
    /// A block's declared length is shorter than its header or escapes the buffer.
    #[snafu(display("block at offset {offset} declares length {length}, buffer ends at {total}"))]
    CorruptCollection {
        offset: usize,
        length: usize,
        total: usize,
    },
    /// A length or count field holds a value that cannot describe a valid layout.
    #[snafu(display("{field} holds invalid length {length}"))]
    InvalidLength { field: &'static str, length: u64 },
}

/// A layout description that can never decode correctly.
///
/// Schema constants report these at compile time through the `checked` constructors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum SpecError {
    #[snafu(display("bitfield mask is zero"))]
    ZeroMask,
    #[snafu(display("{field} starts before the field preceding it"))]
    NonMonotonicOffset { field: &'static str },
    #[snafu(display("{field} overlaps the field preceding it"))]
    OverlappingField { field: &'static str },
    #[snafu(display("{field} ends at {end}, past the fixed size {size}"))]
    FieldOutOfBounds {
        field: &'static str,
        end: usize,
        size: usize,
    },
    #[snafu(display("{field} has zero size"))]
    ZeroElementSize { field: &'static str },
}

impl SpecError {
    /// Message for compile-time failures, where formatting is unavailable.
    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            Self::ZeroMask => "bitfield mask is zero",
            Self::NonMonotonicOffset { .. } => "field offsets are not monotonic",
            Self::OverlappingField { .. } => "fields overlap",
            Self::FieldOutOfBounds { .. } => "field lies past the fixed size",
            Self::ZeroElementSize { .. } => "element size is zero",
        }
    }
}
