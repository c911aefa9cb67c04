use crate::{decode_as, DescriptorType, Error, DESCRIPTOR_TYPE, LENGTH};
use alloc::string::String;
use core::{
    char::{decode_utf16, REPLACEMENT_CHARACTER},
    iter::Take,
};
use usb_layout::{
    array::Elements, CountSource, DecodeError, Element, FieldSpec, StructSchema,
    VariableArraySpec, Width,
};

const FIELDS: [FieldSpec; 2] = [LENGTH, DESCRIPTOR_TYPE];

/// A header followed by UTF-16LE code units. String index 0 holds language IDs
/// instead.
pub const STRING: StructSchema = StructSchema::checked("string", 2, &FIELDS).with_trailing(
    VariableArraySpec::checked("bString", CountSource::Remaining, Element::scalar(Width::U16)),
);

view! {
    pub struct StringDescriptor {
        length: u8 = LENGTH;
    }
}

impl<B: AsRef<[u8]>> StringDescriptor<B> {
    /// Decodes a string descriptor. `bLength` must cover whole code units.
    pub fn new(bytes: B) -> Result<Self, Error> {
        let view = decode_as(&STRING, DescriptorType::String, bytes)?;
        let length = view.get(&LENGTH);
        if length % 2 != 0 {
            return Err(Error::Malformed {
                descriptor: STRING.name(),
                source: DecodeError::InvalidLength {
                    field: LENGTH.name,
                    length,
                },
            });
        }
        Ok(Self(view))
    }

    pub fn iter(&self) -> StringIter<'_> {
        let units = usize::from(self.length()).saturating_sub(STRING.size()) / 2;
        let elements = self.0.trailing().map(|a| a.iter()).unwrap_or_default();
        StringIter(elements.take(units))
    }

    /// Language IDs, for the descriptor at string index 0.
    pub fn language_ids(&self) -> StringIter<'_> {
        self.iter()
    }

    /// Decodes the text, replacing unpaired surrogates.
    pub fn to_string_lossy(&self) -> String {
        decode_utf16(self.iter())
            .map(|c| c.unwrap_or(REPLACEMENT_CHARACTER))
            .collect()
    }
}

/// UTF-16 code units of a [`StringDescriptor`].
#[derive(Clone, Debug)]
pub struct StringIter<'a>(Take<Elements<'a>>);

impl Iterator for StringIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|c| u16::from_le_bytes([c[0], c[1]]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for StringIter<'_> {}
