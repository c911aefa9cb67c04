use crate::{
    error::{DecodeError, SpecError},
    field::{Accessor, FieldSpec},
    schema::{Struct, StructSchema},
};
use alloc::vec::Vec;
use core::iter::FusedIterator;

/// The part of every block that gives its length and type.
#[derive(Clone, Copy, Debug)]
pub struct BlockHeader {
    length: FieldSpec,
    discriminant: FieldSpec,
    size: usize,
}

impl BlockHeader {
    pub const fn new(length: FieldSpec, discriminant: FieldSpec) -> Result<Self, SpecError> {
        if length.size() == 0 {
            return Err(SpecError::ZeroElementSize { field: length.name });
        }
        if discriminant.size() == 0 {
            return Err(SpecError::ZeroElementSize {
                field: discriminant.name,
            });
        }
        let size = if length.end() > discriminant.end() {
            length.end()
        } else {
            discriminant.end()
        };
        Ok(Self {
            length,
            discriminant,
            size,
        })
    }

    pub const fn checked(length: FieldSpec, discriminant: FieldSpec) -> Self {
        match Self::new(length, discriminant) {
            Ok(h) => h,
            Err(e) => panic!("{}", e.as_str()),
        }
    }

    /// Smallest valid block length.
    pub const fn size(&self) -> usize {
        self.size
    }

    pub const fn discriminant(&self) -> FieldSpec {
        self.discriminant
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Entry<'r> {
    pub discriminant: u64,
    pub schema: &'r StructSchema,
}

/// Maps block discriminants to schemas. Unlisted discriminants decode as opaque.
#[derive(Clone, Copy, Debug)]
pub struct Registry<'r> {
    header: BlockHeader,
    entries: &'r [Entry<'r>],
}

impl<'r> Registry<'r> {
    pub const fn new(header: BlockHeader, entries: &'r [Entry<'r>]) -> Self {
        Self { header, entries }
    }

    pub const fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn lookup(&self, discriminant: u64) -> Option<&'r StructSchema> {
        self.entries
            .iter()
            .find(|e| e.discriminant == discriminant)
            .map(|e| e.schema)
    }

    /// Walks the blocks packed back to back in `bytes`.
    pub fn scan<'a>(&self, bytes: &'a [u8]) -> Scanner<'r, 'a> {
        Scanner {
            registry: *self,
            bytes,
            state: State::Scanning(0),
        }
    }

    /// Decodes every block, failing on the first error.
    pub fn decode_all<'a>(&self, bytes: &'a [u8]) -> Result<Vec<Block<'r, 'a>>, DecodeError> {
        self.scan(bytes).collect()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Block<'r, 'a> {
    Known {
        discriminant: u64,
        view: Struct<'r, &'a [u8]>,
    },
    Opaque(OpaqueBlock<'a>),
}

impl<'r, 'a> Block<'r, 'a> {
    pub fn discriminant(&self) -> u64 {
        match self {
            Self::Known { discriminant, .. } => *discriminant,
            Self::Opaque(o) => o.discriminant,
        }
    }

    /// The whole block, header included.
    pub fn as_bytes(&self) -> &'a [u8] {
        match self {
            Self::Known { view, .. } => view.into_inner(),
            Self::Opaque(o) => o.bytes,
        }
    }
}

/// A block whose discriminant has no schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpaqueBlock<'a> {
    pub discriminant: u64,
    /// The whole block, header included.
    pub bytes: &'a [u8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// The next block starts at this offset.
    Scanning(usize),
    /// Every block up to this offset, the end of the buffer, was consumed.
    Done(usize),
    /// The block at this offset has a length that would escape the buffer.
    Corrupt(usize),
}

/// Iterator over the blocks of a buffer.
///
/// A block that fails to decode against its schema is yielded as an error and the
/// walk continues with the next block. A corrupt block length is yielded as an error
/// and ends the walk.
#[derive(Clone, Debug)]
pub struct Scanner<'r, 'a> {
    registry: Registry<'r>,
    bytes: &'a [u8],
    state: State,
}

impl<'r, 'a> Scanner<'r, 'a> {
    pub fn state(&self) -> State {
        self.state
    }

    /// Offset of the next block, or where the walk stopped.
    pub fn offset(&self) -> usize {
        match self.state {
            State::Scanning(o) | State::Done(o) | State::Corrupt(o) => o,
        }
    }

    /// Everything from the current offset on.
    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.offset()..]
    }
}

impl<'r, 'a> Iterator for Scanner<'r, 'a> {
    type Item = Result<Block<'r, 'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let State::Scanning(offset) = self.state else {
            return None;
        };
        let total = self.bytes.len();
        if offset >= total {
            self.state = State::Done(offset);
            return None;
        }
        let rest = &self.bytes[offset..];
        let header = self.registry.header;
        let length = header
            .length
            .read(rest)
            .map_or(rest.len(), |l| usize::try_from(l).unwrap_or(usize::MAX));
        if length < header.size || length > rest.len() {
            warn!(
                "block at offset {} declares length {}, buffer ends at {}",
                offset, length, total
            );
            self.state = State::Corrupt(offset);
            return Some(Err(DecodeError::CorruptCollection {
                offset,
                length,
                total,
            }));
        }
        let block = &rest[..length];
        let discriminant = header.discriminant.load(block);
        self.state = State::Scanning(offset + length);
        trace!("block {:#x} at offset {}, length {}", discriminant, offset, length);
        Some(match self.registry.lookup(discriminant) {
            Some(schema) => Struct::decode(schema, block).map(|view| Block::Known { discriminant, view }),
            None => {
                debug!("no schema for block {:#x}, keeping it opaque", discriminant);
                Ok(Block::Opaque(OpaqueBlock {
                    discriminant,
                    bytes: block,
                }))
            }
        })
    }
}

impl FusedIterator for Scanner<'_, '_> {}
