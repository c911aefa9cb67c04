use crate::schema::StructSchema;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use core::ops::Range;

/// Size of an integer field or array element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Width {
    U8,
    U16,
    U32,
    U64,
}

impl Width {
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    pub const fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Every bit a value of this width can hold.
    pub const fn mask(self) -> u64 {
        u64::MAX >> (64 - self.bits())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Reads a `width` integer from the start of `bytes`.
    pub fn read(self, bytes: &[u8], width: Width) -> u64 {
        let n = width.bytes();
        match self {
            Self::Little => LittleEndian::read_uint(bytes, n),
            Self::Big => BigEndian::read_uint(bytes, n),
        }
    }

    /// Writes the low `width` bits of `value` to the start of `bytes`.
    pub fn write(self, bytes: &mut [u8], width: Width, value: u64) {
        let n = width.bytes();
        let value = value & width.mask();
        match self {
            Self::Little => LittleEndian::write_uint(bytes, value, n),
            Self::Big => BigEndian::write_uint(bytes, value, n),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    /// A single integer of the field's width.
    Int,
    /// Another fixed layout, embedded by value.
    Struct(&'static StructSchema),
    /// `len` integers of the field's width.
    Array { len: usize },
}

/// One entry of a [`StructSchema`].
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub width: Width,
    pub endian: Endian,
    pub kind: FieldKind,
}

impl FieldSpec {
    /// A little-endian integer.
    pub const fn int(name: &'static str, offset: usize, width: Width) -> Self {
        Self {
            name,
            offset,
            width,
            endian: Endian::Little,
            kind: FieldKind::Int,
        }
    }

    pub const fn u8(name: &'static str, offset: usize) -> Self {
        Self::int(name, offset, Width::U8)
    }

    pub const fn u16(name: &'static str, offset: usize) -> Self {
        Self::int(name, offset, Width::U16)
    }

    pub const fn u32(name: &'static str, offset: usize) -> Self {
        Self::int(name, offset, Width::U32)
    }

    pub const fn nested(name: &'static str, offset: usize, schema: &'static StructSchema) -> Self {
        Self {
            name,
            offset,
            width: Width::U8,
            endian: Endian::Little,
            kind: FieldKind::Struct(schema),
        }
    }

    pub const fn array(name: &'static str, offset: usize, width: Width, len: usize) -> Self {
        Self {
            name,
            offset,
            width,
            endian: Endian::Little,
            kind: FieldKind::Array { len },
        }
    }

    pub const fn big_endian(mut self) -> Self {
        self.endian = Endian::Big;
        self
    }

    /// Bytes occupied in the fixed layout.
    pub const fn size(&self) -> usize {
        match self.kind {
            FieldKind::Int => self.width.bytes(),
            FieldKind::Struct(schema) => schema.size(),
            FieldKind::Array { len } => len * self.width.bytes(),
        }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.size()
    }

    pub const fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

/// Typed access to a part of a structure's fixed bytes.
///
/// Implemented by [`FieldSpec`] and by the narrowing and interpreting wrappers
/// [`Bits`](crate::Bits) and [`Typed`](crate::Typed), which compose freely.
pub trait Accessor {
    type Value;

    /// Bytes touched, relative to the start of the structure.
    fn span(&self) -> Range<usize>;

    /// Reads the value. `bytes` must cover [`span`](Self::span).
    fn load(&self, bytes: &[u8]) -> Self::Value;

    /// Writes the value, leaving every byte and bit outside it untouched.
    /// `bytes` must cover [`span`](Self::span).
    fn store(&self, bytes: &mut [u8], value: Self::Value);

    /// Reads the value, or `None` if `bytes` is too short.
    fn read(&self, bytes: &[u8]) -> Option<Self::Value> {
        (self.span().end <= bytes.len()).then(|| self.load(bytes))
    }

    /// Writes the value, or returns `None` without writing if `bytes` is too short.
    fn write(&self, bytes: &mut [u8], value: Self::Value) -> Option<()> {
        (self.span().end <= bytes.len()).then(|| self.store(bytes, value))
    }
}

/// Reads the integer at the field's offset. For arrays this is the first element.
impl Accessor for FieldSpec {
    type Value = u64;

    fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.width.bytes()
    }

    fn load(&self, bytes: &[u8]) -> u64 {
        self.endian.read(&bytes[self.span()], self.width)
    }

    fn store(&self, bytes: &mut [u8], value: u64) {
        let span = self.span();
        self.endian.write(&mut bytes[span], self.width, value)
    }
}
