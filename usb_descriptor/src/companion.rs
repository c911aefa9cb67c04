use crate::{decode_as, DescriptorType, Error, DESCRIPTOR_TYPE, LENGTH};
use usb_layout::{BitfieldSpec, Bits, FieldSpec, StructSchema};

const MAX_BURST: FieldSpec = FieldSpec::u8("bMaxBurst", 2);
const ATTRIBUTES: FieldSpec = FieldSpec::u8("bmAttributes", 3);
const BYTES_PER_INTERVAL: FieldSpec = FieldSpec::u16("wBytesPerInterval", 4);

const FIELDS: [FieldSpec; 5] = [LENGTH, DESCRIPTOR_TYPE, MAX_BURST, ATTRIBUTES, BYTES_PER_INTERVAL];

pub const SS_ENDPOINT_COMPANION: StructSchema =
    StructSchema::checked("SuperSpeed endpoint companion", 6, &FIELDS);

view! {
    /// Follows each endpoint descriptor of a SuperSpeed configuration.
    pub struct SsEndpointCompanion {
        max_burst: u8 = MAX_BURST;
        attributes: u8 = ATTRIBUTES;
        /// Log2 of the streams a bulk endpoint supports.
        max_streams: u8 = Bits::new(ATTRIBUTES, BitfieldSpec::checked(0x1f));
        /// Maximum packets per service interval of an isochronous endpoint, minus one.
        mult: u8 = Bits::new(ATTRIBUTES, BitfieldSpec::checked(0x03));
        bytes_per_interval: u16 = BYTES_PER_INTERVAL;
    }
}

impl<B: AsRef<[u8]>> SsEndpointCompanion<B> {
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_as(
            &SS_ENDPOINT_COMPANION,
            DescriptorType::SsEndpointCompanion,
            bytes,
        )
        .map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_streams() {
        let c = SsEndpointCompanion::new(&[0x06, 0x30, 0x0f, 0x04, 0x00, 0x00][..]).unwrap();
        assert_eq!(c.max_burst(), 15);
        assert_eq!(c.max_streams(), 4);
        assert_eq!(c.mult(), 0);
        assert_eq!(c.bytes_per_interval(), 0);
    }
}
