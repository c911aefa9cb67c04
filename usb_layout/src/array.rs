use crate::{
    error::{DecodeError, InvalidLengthSnafu, SpecError, TruncatedArraySnafu, TruncatedBufferSnafu},
    field::{Accessor, Endian, FieldSpec, Width},
    schema::{Struct, StructSchema},
};
use core::{fmt, iter::FusedIterator};
use snafu::{ensure, OptionExt};

/// Where the element count of a trailing array comes from.
#[derive(Clone, Copy, Debug)]
pub enum CountSource {
    /// An integer field of the fixed prefix.
    Field(FieldSpec),
    /// As many whole elements as fit in the remaining bytes.
    Remaining,
}

#[derive(Clone, Copy, Debug)]
pub enum Element {
    Scalar { width: Width, endian: Endian },
    Struct(&'static StructSchema),
    /// A struct whose total size, trailing bytes included, is given by its own
    /// `length` field.
    Sized {
        schema: &'static StructSchema,
        length: FieldSpec,
    },
}

impl Element {
    pub const fn scalar(width: Width) -> Self {
        Self::Scalar {
            width,
            endian: Endian::Little,
        }
    }

    /// `None` when every element carries its own size.
    pub const fn size(&self) -> Option<usize> {
        match self {
            Self::Scalar { width, .. } => Some(width.bytes()),
            Self::Struct(schema) => Some(schema.size()),
            Self::Sized { .. } => None,
        }
    }

    pub const fn schema(&self) -> Option<&'static StructSchema> {
        match self {
            Self::Scalar { .. } => None,
            Self::Struct(schema) | Self::Sized { schema, .. } => Some(*schema),
        }
    }
}

/// An array following a schema's fixed prefix.
#[derive(Clone, Copy, Debug)]
pub struct VariableArraySpec {
    name: &'static str,
    count: CountSource,
    element: Element,
}

impl VariableArraySpec {
    pub const fn new(
        name: &'static str,
        count: CountSource,
        element: Element,
    ) -> Result<Self, SpecError> {
        match element {
            Element::Scalar { .. } => {}
            Element::Struct(schema) => {
                if schema.size() == 0 {
                    return Err(SpecError::ZeroElementSize { field: name });
                }
            }
            Element::Sized { schema, length } => {
                if schema.size() == 0 {
                    return Err(SpecError::ZeroElementSize { field: name });
                }
                if length.end() > schema.size() {
                    return Err(SpecError::FieldOutOfBounds {
                        field: length.name,
                        end: length.end(),
                        size: schema.size(),
                    });
                }
            }
        }
        Ok(Self {
            name,
            count,
            element,
        })
    }

    pub const fn checked(name: &'static str, count: CountSource, element: Element) -> Self {
        match Self::new(name, count, element) {
            Ok(s) => s,
            Err(e) => panic!("{}", e.as_str()),
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn element(&self) -> Element {
        self.element
    }

    pub(crate) const fn count_field(&self) -> Option<FieldSpec> {
        match self.count {
            CountSource::Field(f) => Some(f),
            CountSource::Remaining => None,
        }
    }

    /// Resolves the array in `tail` using counts read from the already decoded
    /// `fixed` prefix.
    pub fn resolve<'a>(&self, fixed: &[u8], tail: &'a [u8]) -> Result<Array<'a>, DecodeError> {
        let count = match self.count {
            CountSource::Field(f) => {
                let raw = f.read(fixed).context(TruncatedBufferSnafu {
                    schema: self.name,
                    needed: f.end(),
                    actual: fixed.len(),
                })?;
                Some(to_len(f.name, raw)?)
            }
            CountSource::Remaining => None,
        };
        layout(self.name, count, self.element, tail)
    }
}

fn to_len(field: &'static str, raw: u64) -> Result<usize, DecodeError> {
    usize::try_from(raw)
        .ok()
        .context(InvalidLengthSnafu { field, length: raw })
}

/// Lays `count` elements, or as many as fit, out at the start of `bytes`.
fn layout<'a>(
    name: &'static str,
    count: Option<usize>,
    element: Element,
    bytes: &'a [u8],
) -> Result<Array<'a>, DecodeError> {
    let available = bytes.len();
    let (count, extent) = match element {
        Element::Sized { schema, length } => walk(name, count, schema, length, bytes)?,
        _ => {
            let size = element.size().unwrap_or(0);
            ensure!(size > 0, InvalidLengthSnafu { field: name, length: 0u64 });
            match count {
                Some(count) => {
                    let needed = count.checked_mul(size).context(InvalidLengthSnafu {
                        field: name,
                        length: count as u64,
                    })?;
                    if needed > available {
                        warn!("{} needs {} bytes, {} available", name, needed, available);
                        return TruncatedArraySnafu {
                            array: name,
                            count,
                            needed,
                            available,
                        }
                        .fail();
                    }
                    (count, needed)
                }
                None => (available / size, available / size * size),
            }
        }
    };
    let (bytes, rest) = bytes.split_at(extent);
    Ok(Array {
        name,
        element,
        count,
        bytes,
        rest,
    })
}

/// Walks self-sized elements, returning their count and total extent.
fn walk(
    name: &'static str,
    count: Option<usize>,
    schema: &StructSchema,
    length: FieldSpec,
    bytes: &[u8],
) -> Result<(usize, usize), DecodeError> {
    let available = bytes.len();
    let (mut n, mut offset) = (0, 0);
    while count.map_or(offset < available, |c| n < c) {
        let truncated = |needed| {
            warn!("{} element {} needs {} bytes, {} available", name, n, needed, available);
            TruncatedArraySnafu {
                array: name,
                count: count.unwrap_or(n + 1),
                needed,
                available,
            }
            .fail()
        };
        let rest = &bytes[offset..];
        if rest.len() < schema.size() {
            return truncated(offset + schema.size());
        }
        let raw = length.read(rest).context(TruncatedBufferSnafu {
            schema: schema.name(),
            needed: offset + length.end(),
            actual: available,
        })?;
        let len = to_len(length.name, raw)?;
        ensure!(
            len >= schema.size(),
            InvalidLengthSnafu {
                field: length.name,
                length: len as u64,
            }
        );
        if len > rest.len() {
            return truncated(offset + len);
        }
        offset += len;
        n += 1;
    }
    Ok((n, offset))
}

/// A resolved array. Its extent has been checked, so iteration cannot fail.
#[derive(Clone, Copy)]
pub struct Array<'a> {
    name: &'static str,
    element: Element,
    count: usize,
    bytes: &'a [u8],
    rest: &'a [u8],
}

impl<'a> Array<'a> {
    pub(crate) fn scalars(
        name: &'static str,
        width: Width,
        endian: Endian,
        count: usize,
        bytes: &'a [u8],
    ) -> Self {
        debug_assert_eq!(bytes.len(), count * width.bytes());
        Self {
            name,
            element: Element::Scalar { width, endian },
            count,
            bytes,
            rest: &[],
        }
    }

    pub(crate) fn empty(name: &'static str, rest: &'a [u8]) -> Self {
        Self {
            name,
            element: Element::scalar(Width::U8),
            count: 0,
            bytes: &[],
            rest,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The bytes covered by the elements.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The bytes after the last element.
    pub fn rest(&self) -> &'a [u8] {
        self.rest
    }

    pub fn iter(&self) -> Elements<'a> {
        Elements {
            element: self.element,
            bytes: self.bytes,
            remaining: self.count,
        }
    }

    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        match self.element.size() {
            Some(size) if index < self.count => Some(&self.bytes[index * size..][..size]),
            Some(_) => None,
            None => self.iter().nth(index),
        }
    }

    /// The integer at `index`, for scalar arrays.
    pub fn value(&self, index: usize) -> Option<u64> {
        match self.element {
            Element::Scalar { width, endian } => self.get(index).map(|e| endian.read(e, width)),
            _ => None,
        }
    }

    /// All integers of a scalar array.
    pub fn values(&self) -> impl Iterator<Item = u64> + 'a {
        let element = self.element;
        self.iter().filter_map(move |e| match element {
            Element::Scalar { width, endian } => Some(endian.read(e, width)),
            _ => None,
        })
    }

    /// All elements of a struct array as views.
    pub fn structs(&self) -> impl Iterator<Item = Struct<'static, &'a [u8]>> + 'a {
        let schema = self.element.schema();
        self.iter()
            .filter_map(move |e| schema.map(|s| Struct::new_unchecked(s, e)))
    }
}

impl<'a> IntoIterator for Array<'a> {
    type Item = &'a [u8];
    type IntoIter = Elements<'a>;

    fn into_iter(self) -> Elements<'a> {
        self.iter()
    }
}

impl fmt::Debug for Array<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut l = f.debug_list();
        match self.element {
            Element::Scalar { .. } => l.entries(self.values()),
            _ => l.entries(self.structs()),
        };
        l.finish()
    }
}

/// Raw element slices of an [`Array`].
#[derive(Clone, Debug)]
pub struct Elements<'a> {
    element: Element,
    bytes: &'a [u8],
    remaining: usize,
}

impl Default for Elements<'_> {
    fn default() -> Self {
        Self {
            element: Element::scalar(Width::U8),
            bytes: &[],
            remaining: 0,
        }
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.remaining == 0 {
            return None;
        }
        let size = match self.element {
            Element::Sized { length, .. } => {
                length.read(self.bytes).and_then(|l| usize::try_from(l).ok())?
            }
            e => e.size()?,
        };
        if size == 0 || size > self.bytes.len() {
            self.remaining = 0;
            return None;
        }
        let (e, rest) = self.bytes.split_at(size);
        self.bytes = rest;
        self.remaining -= 1;
        Some(e)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Elements<'_> {}

impl FusedIterator for Elements<'_> {}

/// Staged decoding of layouts where fixed fields follow variable parts.
///
/// Each step consumes bytes from the front, failing without consuming anything when
/// too few remain.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }

    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    /// A fixed layout, limited to its own size.
    pub fn fixed<'s>(&mut self, schema: &'s StructSchema) -> Result<Struct<'s, &'a [u8]>, DecodeError> {
        let rest = self.remaining();
        let size = schema.size().min(rest.len());
        let view = Struct::decode(schema, &rest[..size])?;
        self.offset += size;
        Ok(view)
    }

    pub fn take(&mut self, name: &'static str, len: usize) -> Result<&'a [u8], DecodeError> {
        let rest = self.remaining();
        ensure!(
            len <= rest.len(),
            TruncatedArraySnafu {
                array: name,
                count: len,
                needed: len,
                available: rest.len(),
            }
        );
        self.offset += len;
        Ok(&rest[..len])
    }

    /// A little-endian integer.
    pub fn scalar(&mut self, name: &'static str, width: Width) -> Result<u64, DecodeError> {
        self.take(name, width.bytes())
            .map(|b| Endian::Little.read(b, width))
    }

    pub fn u8(&mut self, name: &'static str) -> Result<u8, DecodeError> {
        self.take(name, 1).map(|b| b[0])
    }

    pub fn u16(&mut self, name: &'static str) -> Result<u16, DecodeError> {
        self.scalar(name, Width::U16).map(|v| v as u16)
    }

    pub fn array(
        &mut self,
        name: &'static str,
        count: usize,
        element: Element,
    ) -> Result<Array<'a>, DecodeError> {
        let array = layout(name, Some(count), element, self.remaining())?;
        self.offset += array.as_bytes().len();
        Ok(array)
    }

    /// Everything not yet consumed.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = self.remaining();
        self.offset = self.bytes.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIR_FIELDS: [FieldSpec; 2] = [FieldSpec::u8("a", 0), FieldSpec::u8("b", 1)];
    const PAIR: StructSchema = StructSchema::checked("pair", 2, &PAIR_FIELDS);

    const CAP_FIELDS: [FieldSpec; 3] = [
        FieldSpec::u8("bLength", 0),
        FieldSpec::u8("bDescriptorType", 1),
        FieldSpec::u8("bDevCapabilityType", 2),
    ];
    const CAP: StructSchema = StructSchema::checked("capability", 3, &CAP_FIELDS);
    const CAPS: Element = Element::Sized {
        schema: &CAP,
        length: FieldSpec::u8("bLength", 0),
    };

    #[track_caller]
    fn resolve<'a>(count: CountSource, element: Element, fixed: &[u8], tail: &'a [u8]) -> Result<Array<'a>, DecodeError> {
        VariableArraySpec::new("test", count, element)
            .unwrap()
            .resolve(fixed, tail)
    }

    #[test]
    fn implicit_count() {
        let a = resolve(
            CountSource::Remaining,
            Element::scalar(Width::U16),
            &[],
            &[0x41, 0x00, 0x42, 0x00, 0x43],
        )
        .unwrap();
        assert_eq!(a.len(), 2);
        assert!(a.values().eq([0x41, 0x42]));
        assert_eq!(a.rest(), [0x43]);
    }

    #[test]
    fn counted_structs() {
        let a = resolve(
            CountSource::Field(FieldSpec::u8("n", 1)),
            Element::Struct(&PAIR),
            &[0xff, 2],
            &[1, 2, 3, 4, 5],
        )
        .unwrap();
        let pairs = a.structs().map(|s| (s.value("a"), s.value("b")));
        assert!(pairs.eq([(Some(1), Some(2)), (Some(3), Some(4))]));
        assert_eq!(a.get(1), Some(&[3, 4][..]));
        assert_eq!(a.get(2), None);
        assert_eq!(a.rest(), [5]);
    }

    #[test]
    fn count_past_end() {
        let e = resolve(
            CountSource::Field(FieldSpec::u8("n", 0)),
            Element::scalar(Width::U32),
            &[3],
            &[0; 11],
        )
        .unwrap_err();
        assert_eq!(
            e,
            DecodeError::TruncatedArray {
                array: "test",
                count: 3,
                needed: 12,
                available: 11
            }
        );
    }

    #[test]
    fn count_field_missing() {
        let e = resolve(
            CountSource::Field(FieldSpec::u16("n", 1)),
            Element::scalar(Width::U8),
            &[0, 1],
            &[],
        )
        .unwrap_err();
        assert!(matches!(e, DecodeError::TruncatedBuffer { needed: 3, actual: 2, .. }));
    }

    #[test]
    fn self_sized() {
        let tail = [3, 0x10, 1, 5, 0x10, 2, 0xaa, 0xbb, 0xcc];
        let a = resolve(
            CountSource::Field(FieldSpec::u8("n", 0)),
            CAPS,
            &[2],
            &tail,
        )
        .unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.get(1), Some(&tail[3..8]));
        let kinds = a.structs().map(|s| s.value("bDevCapabilityType"));
        assert!(kinds.eq([Some(1), Some(2)]));
        assert_eq!(a.structs().nth(1).map(|s| s.tail().len()), Some(2));
        assert_eq!(a.rest(), [0xcc]);

        let a = resolve(CountSource::Remaining, CAPS, &[], &tail[..8]).unwrap();
        assert_eq!(a.len(), 2);
        assert!(a.rest().is_empty());
    }

    #[test]
    fn self_sized_zero_length() {
        let e = resolve(CountSource::Remaining, CAPS, &[], &[0, 0x10, 1]).unwrap_err();
        assert_eq!(
            e,
            DecodeError::InvalidLength {
                field: "bLength",
                length: 0
            }
        );
    }

    #[test]
    fn self_sized_overlong() {
        let e = resolve(CountSource::Remaining, CAPS, &[], &[3, 0x10, 1, 9, 0x10, 2]).unwrap_err();
        assert_eq!(
            e,
            DecodeError::TruncatedArray {
                array: "test",
                count: 2,
                needed: 12,
                available: 6
            }
        );
    }

    #[test]
    fn zero_sized_elements() {
        const NOTHING: StructSchema = StructSchema::checked("nothing", 0, &[]);
        assert_eq!(
            VariableArraySpec::new("x", CountSource::Remaining, Element::Struct(&NOTHING)).unwrap_err(),
            SpecError::ZeroElementSize { field: "x" }
        );
        let mut c = Cursor::new(&[1, 2]);
        assert!(c.array("x", 4, Element::Struct(&NOTHING)).is_err());
    }

    #[test]
    fn staged() {
        let buf = [2, 7, 8, 0x34, 0x12, 9, 0xde, 0xad];
        let mut c = Cursor::new(&buf);
        let n = c.u8("bNrInPins").unwrap();
        let sources = c.array("baSourceID", n.into(), Element::scalar(Width::U8)).unwrap();
        assert!(sources.values().eq([7, 8]));
        assert_eq!(c.u16("wChannelConfig").unwrap(), 0x1234);
        let pair = c.fixed(&PAIR).unwrap();
        assert_eq!(pair.value("a"), Some(9));
        assert_eq!(c.offset(), 7);
        assert!(c.take("extra", 2).is_err());
        assert_eq!(c.offset(), 7);
        assert_eq!(c.rest(), [0xad]);
        assert!(c.is_empty());
        assert!(matches!(c.fixed(&PAIR), Err(DecodeError::TruncatedBuffer { .. })));
    }
}
