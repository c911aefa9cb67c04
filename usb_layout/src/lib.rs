//! Typed views over packed, little-endian descriptor buffers.
//!
//! A [`StructSchema`] describes a fixed prefix of integer fields, nested structs and
//! fixed arrays, optionally followed by a [`VariableArraySpec`]. Decoding a buffer
//! against a schema checks its length once and yields a [`Struct`] view that reads
//! (and, for mutable buffers, writes) fields in place.
//!
//! Sub-byte values are reached by composing accessors: a [`FieldSpec`] narrowed with
//! [`Bits`] and interpreted with [`Typed`]. Buffers made of length-prefixed, type-tagged
//! blocks are walked with a [`Registry`] scan.
//!
//! Schemas, specs and registries are plain immutable values, normally `const` items.
//! Invalid schema constants fail to compile.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
mod log;

pub mod array;
pub mod bitfield;
pub mod codec;
pub mod collection;
mod error;
pub mod field;
pub mod schema;
pub mod view;

pub use array::{Array, CountSource, Cursor, Element, VariableArraySpec};
pub use bitfield::{Bits, BitfieldSpec};
pub use codec::{EnumCodec, RawCode, Typed};
pub use collection::{Block, BlockHeader, Entry, OpaqueBlock, Registry, Scanner, State};
pub use error::{DecodeError, SpecError};
pub use field::{Accessor, Endian, FieldKind, FieldSpec, Width};
pub use schema::{Struct, StructSchema};
pub use view::{Lease, MemoryView};
