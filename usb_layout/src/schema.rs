use crate::{
    array::{Array, VariableArraySpec},
    error::{DecodeError, SpecError, TruncatedBufferSnafu},
    field::{Accessor, FieldKind, FieldSpec},
};
use alloc::vec::Vec;
use core::fmt;
use snafu::ensure;

/// An immutable description of a fixed layout and what follows it.
#[derive(Clone, Copy, Debug)]
pub struct StructSchema {
    name: &'static str,
    size: usize,
    fields: &'static [FieldSpec],
    trailing: Option<VariableArraySpec>,
}

impl StructSchema {
    /// Checks that fields are in offset order, do not overlap and lie within `size`.
    pub const fn new(
        name: &'static str,
        size: usize,
        fields: &'static [FieldSpec],
    ) -> Result<Self, SpecError> {
        let mut i = 0;
        let mut prev_offset = 0;
        let mut prev_end = 0;
        while i < fields.len() {
            let f = &fields[i];
            if f.offset < prev_offset {
                return Err(SpecError::NonMonotonicOffset { field: f.name });
            }
            if f.offset < prev_end {
                return Err(SpecError::OverlappingField { field: f.name });
            }
            if f.size() == 0 {
                return Err(SpecError::ZeroElementSize { field: f.name });
            }
            if f.end() > size {
                return Err(SpecError::FieldOutOfBounds {
                    field: f.name,
                    end: f.end(),
                    size,
                });
            }
            prev_offset = f.offset;
            prev_end = f.end();
            i += 1;
        }
        Ok(Self {
            name,
            size,
            fields,
            trailing: None,
        })
    }

    /// Like [`new`](Self::new), but an invalid layout panics, which fails the build
    /// when evaluated in a `const` item.
    pub const fn checked(name: &'static str, size: usize, fields: &'static [FieldSpec]) -> Self {
        match Self::new(name, size, fields) {
            Ok(s) => s,
            Err(e) => panic!("{}", e.as_str()),
        }
    }

    /// Declares an array after the fixed prefix. A count field must lie in the prefix.
    pub const fn try_with_trailing(mut self, trailing: VariableArraySpec) -> Result<Self, SpecError> {
        if let Some(count) = trailing.count_field() {
            if count.end() > self.size {
                return Err(SpecError::FieldOutOfBounds {
                    field: count.name,
                    end: count.end(),
                    size: self.size,
                });
            }
        }
        self.trailing = Some(trailing);
        Ok(self)
    }

    pub const fn with_trailing(self, trailing: VariableArraySpec) -> Self {
        match self.try_with_trailing(trailing) {
            Ok(s) => s,
            Err(e) => panic!("{}", e.as_str()),
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Size of the fixed prefix.
    pub const fn size(&self) -> usize {
        self.size
    }

    pub const fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub const fn trailing(&self) -> Option<&VariableArraySpec> {
        self.trailing.as_ref()
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn decode<B: AsRef<[u8]>>(&self, bytes: B) -> Result<Struct<'_, B>, DecodeError> {
        Struct::decode(self, bytes)
    }

    /// Copies every field from `src` into `dst` through its decoded value. Bytes no
    /// field covers are copied as they are.
    fn transcode(&self, src: &[u8], dst: &mut [u8]) {
        let mut gap = 0;
        for f in self.fields {
            dst[gap..f.offset].copy_from_slice(&src[gap..f.offset]);
            gap = f.end();
            match f.kind {
                FieldKind::Int => f.store(dst, f.load(src)),
                FieldKind::Struct(schema) => schema.transcode(&src[f.range()], &mut dst[f.range()]),
                FieldKind::Array { len } => {
                    let w = f.width.bytes();
                    for i in 0..len {
                        let at = f.offset + i * w;
                        let v = f.endian.read(&src[at..], f.width);
                        f.endian.write(&mut dst[at..], f.width, v);
                    }
                }
            }
        }
        dst[gap..self.size].copy_from_slice(&src[gap..self.size]);
    }
}

/// A decoded view: a schema laid over bytes that are at least its fixed size.
///
/// Reads and writes go straight to the underlying buffer.
#[derive(Clone, Copy)]
pub struct Struct<'s, B> {
    schema: &'s StructSchema,
    bytes: B,
}

impl<'s, B: AsRef<[u8]>> Struct<'s, B> {
    pub fn decode(schema: &'s StructSchema, bytes: B) -> Result<Self, DecodeError> {
        let actual = bytes.as_ref().len();
        ensure!(
            actual >= schema.size,
            TruncatedBufferSnafu {
                schema: schema.name,
                needed: schema.size,
                actual,
            }
        );
        Ok(Self { schema, bytes })
    }

    /// Callers guarantee `bytes` covers the fixed size.
    pub(crate) fn new_unchecked(schema: &'s StructSchema, bytes: B) -> Self {
        debug_assert!(bytes.as_ref().len() >= schema.size);
        Self { schema, bytes }
    }

    pub fn schema(&self) -> &'s StructSchema {
        self.schema
    }

    /// The whole buffer the view was decoded from.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    pub fn fixed_bytes(&self) -> &[u8] {
        &self.bytes.as_ref()[..self.schema.size]
    }

    /// Bytes past the fixed prefix, undecoded.
    pub fn tail(&self) -> &[u8] {
        &self.bytes.as_ref()[self.schema.size..]
    }

    pub fn into_inner(self) -> B {
        self.bytes
    }

    pub fn by_ref(&self) -> Struct<'s, &[u8]> {
        Struct::new_unchecked(self.schema, self.bytes.as_ref())
    }

    /// # Panics
    ///
    /// If the accessor reaches past the schema's fixed size.
    #[track_caller]
    pub fn get<A: Accessor>(&self, accessor: &A) -> A::Value {
        let span = accessor.span();
        assert!(
            span.end <= self.schema.size,
            "{:?} lies outside {}",
            span,
            self.schema.name
        );
        accessor.load(self.fixed_bytes())
    }

    /// Reads a field by name.
    pub fn value(&self, name: &str) -> Option<u64> {
        self.schema.field(name).map(|f| f.load(self.fixed_bytes()))
    }

    /// # Panics
    ///
    /// If `field` is not a nested struct within the fixed size.
    #[track_caller]
    pub fn nested(&self, field: &FieldSpec) -> Struct<'static, &[u8]> {
        match field.kind {
            FieldKind::Struct(schema) if field.end() <= self.schema.size => {
                Struct::new_unchecked(schema, &self.fixed_bytes()[field.range()])
            }
            _ => panic!("{} is not a nested struct of {}", field.name, self.schema.name),
        }
    }

    /// The elements of a fixed array field.
    ///
    /// # Panics
    ///
    /// If `field` is not an array within the fixed size.
    #[track_caller]
    pub fn array(&self, field: &FieldSpec) -> Array<'_> {
        match field.kind {
            FieldKind::Array { len } if field.end() <= self.schema.size => Array::scalars(
                field.name,
                field.width,
                field.endian,
                len,
                &self.fixed_bytes()[field.range()],
            ),
            _ => panic!("{} is not an array of {}", field.name, self.schema.name),
        }
    }

    /// The schema's trailing array, resolved against the tail. Empty when the schema
    /// declares none.
    pub fn trailing(&self) -> Result<Array<'_>, DecodeError> {
        match self.schema.trailing {
            Some(spec) => spec.resolve(self.fixed_bytes(), self.tail()),
            None => Ok(Array::empty(self.schema.name, self.tail())),
        }
    }

    /// Rebuilds the buffer from decoded field values, followed by the tail verbatim.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = alloc::vec![0; self.schema.size];
        self.schema.transcode(self.fixed_bytes(), &mut out);
        out.extend_from_slice(self.tail());
        out
    }

    /// Copies the buffer, so the view no longer borrows foreign memory.
    pub fn detach(&self) -> Struct<'s, Vec<u8>> {
        Struct::new_unchecked(self.schema, self.as_bytes().to_vec())
    }
}

impl<'s, B: AsRef<[u8]> + AsMut<[u8]>> Struct<'s, B> {
    /// Writes a value, touching only the accessor's bits.
    ///
    /// # Panics
    ///
    /// If the accessor reaches past the schema's fixed size.
    #[track_caller]
    pub fn set<A: Accessor>(&mut self, accessor: &A, value: A::Value) {
        let span = accessor.span();
        assert!(
            span.end <= self.schema.size,
            "{:?} lies outside {}",
            span,
            self.schema.name
        );
        accessor.store(self.fixed_bytes_mut(), value)
    }

    pub fn fixed_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes.as_mut()[..self.schema.size]
    }

    pub fn tail_mut(&mut self) -> &mut [u8] {
        &mut self.bytes.as_mut()[self.schema.size..]
    }
}

impl<B: AsRef<[u8]>> fmt::Debug for Struct<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.fixed_bytes();
        let mut d = f.debug_struct(self.schema.name);
        for field in self.schema.fields {
            match field.kind {
                FieldKind::Int => d.field(field.name, &format_args!("{:#x}", field.load(bytes))),
                FieldKind::Struct(_) => d.field(field.name, &self.nested(field)),
                FieldKind::Array { .. } => d.field(field.name, &self.array(field)),
            };
        }
        if !self.tail().is_empty() {
            d.field("tail", &format_args!("{:02x?}", self.tail()));
        }
        d.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::{CountSource, Element},
        field::Width,
    };
    use quickcheck_macros::quickcheck;

    const FIELDS: [FieldSpec; 9] = [
        FieldSpec::u8("bLength", 0),
        FieldSpec::u8("bDescriptorType", 1),
        FieldSpec::u16("bcdUSB", 2),
        FieldSpec::u8("bDeviceClass", 4),
        FieldSpec::u8("bDeviceSubClass", 5),
        FieldSpec::u8("bDeviceProtocol", 6),
        FieldSpec::u8("bMaxPacketSize0", 7),
        FieldSpec::u16("idVendor", 8),
        FieldSpec::u16("idProduct", 10),
    ];
    const DEVICE: StructSchema = StructSchema::checked("device", 18, &FIELDS);

    const INNER_FIELDS: [FieldSpec; 2] = [FieldSpec::u8("a", 0), FieldSpec::u16("b", 1).big_endian()];
    const INNER: StructSchema = StructSchema::checked("inner", 3, &INNER_FIELDS);
    const OUTER_FIELDS: [FieldSpec; 4] = [
        FieldSpec::u8("count", 0),
        FieldSpec::nested("inner", 1, &INNER),
        FieldSpec::array("words", 4, Width::U16, 2),
        FieldSpec::int("quad", 8, Width::U64).big_endian(),
    ];
    const OUTER: StructSchema = StructSchema::checked("outer", 16, &OUTER_FIELDS).with_trailing(
        VariableArraySpec::checked(
            "items",
            CountSource::Field(FieldSpec::u8("count", 0)),
            Element::scalar(Width::U16),
        ),
    );

    const DEVICE_DUMP: [u8; 18] = [
        0x12, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x40, 0x34, 0x12, 0x78, 0x56, 0x00, 0x01, 0x01,
        0x02, 0x03, 0x01,
    ];

    #[test]
    fn device() {
        let d = DEVICE.decode(&DEVICE_DUMP[..]).unwrap();
        assert_eq!(d.value("bDescriptorType"), Some(1));
        assert_eq!(d.value("idVendor"), Some(0x1234));
        assert_eq!(d.value("idProduct"), Some(0x5678));
        assert_eq!(d.value("iSerial"), None);
        assert_eq!(d.encode(), DEVICE_DUMP);
    }

    #[test]
    fn truncated() {
        assert_eq!(
            DEVICE.decode(&DEVICE_DUMP[..17]).unwrap_err(),
            DecodeError::TruncatedBuffer {
                schema: "device",
                needed: 18,
                actual: 17
            }
        );
    }

    #[test]
    fn invalid_layouts() {
        const OVERLAP: [FieldSpec; 2] = [FieldSpec::u16("a", 0), FieldSpec::u8("b", 1)];
        const BACKWARDS: [FieldSpec; 2] = [FieldSpec::u8("a", 1), FieldSpec::u8("b", 0)];
        const EMPTY: [FieldSpec; 1] = [FieldSpec::array("a", 0, Width::U8, 0)];
        assert_eq!(
            StructSchema::new("x", 4, &OVERLAP).unwrap_err(),
            SpecError::OverlappingField { field: "b" }
        );
        assert_eq!(
            StructSchema::new("x", 4, &BACKWARDS).unwrap_err(),
            SpecError::NonMonotonicOffset { field: "b" }
        );
        assert_eq!(
            StructSchema::new("x", 4, &EMPTY).unwrap_err(),
            SpecError::ZeroElementSize { field: "a" }
        );
        assert_eq!(
            StructSchema::new("x", 17, &FIELDS).map(|_| ()),
            Ok(()),
        );
        assert_eq!(
            StructSchema::new("x", 11, &FIELDS).unwrap_err(),
            SpecError::FieldOutOfBounds {
                field: "idProduct",
                end: 12,
                size: 11
            }
        );
    }

    #[test]
    fn count_field_outside_prefix() {
        let spec = VariableArraySpec::checked(
            "x",
            CountSource::Field(FieldSpec::u8("n", 18)),
            Element::scalar(Width::U8),
        );
        assert!(DEVICE.try_with_trailing(spec).is_err());
    }

    #[test]
    fn set_writes_one_field() {
        let mut buf = DEVICE_DUMP;
        let mut d = DEVICE.decode(&mut buf[..]).unwrap();
        d.set(&FIELDS[7], 0xabcd);
        assert_eq!(d.value("idVendor"), Some(0xabcd));
        let mut expected = DEVICE_DUMP;
        expected[8] = 0xcd;
        expected[9] = 0xab;
        assert_eq!(buf, expected);
    }

    #[test]
    #[should_panic]
    fn get_outside_schema() {
        let d = INNER.decode(&DEVICE_DUMP[..]).unwrap();
        d.get(&FieldSpec::u8("x", 3));
    }

    #[test]
    fn nested_array_and_trailing() {
        let buf = [
            2, 0xaa, 0x01, 0x02, 0x10, 0x00, 0x20, 0x00, 0, 0, 0, 0, 0, 0, 0, 9, 0x34, 0x12, 0x78,
            0x56, 0xee,
        ];
        let s = OUTER.decode(&buf[..]).unwrap();
        let inner = s.nested(&OUTER_FIELDS[1]);
        assert_eq!(inner.value("a"), Some(0xaa));
        assert_eq!(inner.value("b"), Some(0x0102));
        let words = s.array(&OUTER_FIELDS[2]);
        assert_eq!(words.value(0), Some(0x10));
        assert_eq!(words.value(1), Some(0x20));
        assert_eq!(s.value("quad"), Some(9));
        let items = s.trailing().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items.value(1), Some(0x5678));
        assert_eq!(items.rest(), [0xee]);
        assert_eq!(s.encode(), buf);
    }

    #[test]
    fn gaps_survive_encode() {
        const SPARSE_FIELDS: [FieldSpec; 2] = [FieldSpec::u8("a", 0), FieldSpec::u8("c", 2)];
        const SPARSE: StructSchema = StructSchema::checked("sparse", 3, &SPARSE_FIELDS);
        let buf = [1, 0x5a, 3];
        assert_eq!(SPARSE.decode(&buf[..]).unwrap().encode(), buf);
    }

    #[quickcheck]
    fn encode_keeps_undeclared_bytes(bytes: Vec<u8>) -> bool {
        // Undeclared: bytes 0..2, 5, 7, 12..16 and 17.
        const HOLEY_INNER_FIELDS: [FieldSpec; 2] = [FieldSpec::u8("a", 0), FieldSpec::u8("c", 2)];
        const HOLEY_INNER: StructSchema = StructSchema::checked("holey inner", 4, &HOLEY_INNER_FIELDS);
        const HOLEY_FIELDS: [FieldSpec; 4] = [
            FieldSpec::u16("w", 2),
            FieldSpec::nested("inner", 4, &HOLEY_INNER),
            FieldSpec::array("bytes", 8, Width::U8, 4),
            FieldSpec::u8("b", 16),
        ];
        const HOLEY: StructSchema = StructSchema::checked("holey", 18, &HOLEY_FIELDS);
        match HOLEY.decode(&bytes[..]) {
            Ok(s) => s.encode() == bytes,
            Err(_) => bytes.len() < HOLEY.size(),
        }
    }

    #[quickcheck]
    fn encode_reproduces_input(bytes: Vec<u8>) -> bool {
        match OUTER.decode(&bytes[..]) {
            Ok(s) => s.encode() == bytes,
            Err(_) => bytes.len() < OUTER.size(),
        }
    }
}
