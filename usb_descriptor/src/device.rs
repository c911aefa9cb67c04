use crate::{decode_as, ClassCode, DescriptorType, Error, DESCRIPTOR_TYPE, LENGTH};
use usb_layout::{FieldSpec, StructSchema};

const USB: FieldSpec = FieldSpec::u16("bcdUSB", 2);
const CLASS: FieldSpec = FieldSpec::u8("bDeviceClass", 4);
const SUBCLASS: FieldSpec = FieldSpec::u8("bDeviceSubClass", 5);
const PROTOCOL: FieldSpec = FieldSpec::u8("bDeviceProtocol", 6);
const MAX_PACKET_SIZE_0: FieldSpec = FieldSpec::u8("bMaxPacketSize0", 7);
const VENDOR: FieldSpec = FieldSpec::u16("idVendor", 8);
const PRODUCT: FieldSpec = FieldSpec::u16("idProduct", 10);
const DEVICE_VERSION: FieldSpec = FieldSpec::u16("bcdDevice", 12);
const INDEX_MANUFACTURER: FieldSpec = FieldSpec::u8("iManufacturer", 14);
const INDEX_PRODUCT: FieldSpec = FieldSpec::u8("iProduct", 15);
const INDEX_SERIAL_NUMBER: FieldSpec = FieldSpec::u8("iSerialNumber", 16);
const NUM_CONFIGURATIONS: FieldSpec = FieldSpec::u8("bNumConfigurations", 17);

const FIELDS: [FieldSpec; 14] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    USB,
    CLASS,
    SUBCLASS,
    PROTOCOL,
    MAX_PACKET_SIZE_0,
    VENDOR,
    PRODUCT,
    DEVICE_VERSION,
    INDEX_MANUFACTURER,
    INDEX_PRODUCT,
    INDEX_SERIAL_NUMBER,
    NUM_CONFIGURATIONS,
];

pub const DEVICE: StructSchema = StructSchema::checked("device", 18, &FIELDS);

view! {
    pub struct Device {
        descriptor_type: DescriptorType = DESCRIPTOR_TYPE;
        /// USB release in binary-coded decimal, e.g. `0x0200` for 2.0.
        usb / set_usb: u16 = USB;
        class / set_class: ClassCode = CLASS;
        subclass: u8 = SUBCLASS;
        protocol: u8 = PROTOCOL;
        max_packet_size_0: u8 = MAX_PACKET_SIZE_0;
        vendor / set_vendor: u16 = VENDOR;
        product / set_product: u16 = PRODUCT;
        device: u16 = DEVICE_VERSION;
        index_manufacturer: u8 = INDEX_MANUFACTURER;
        index_product: u8 = INDEX_PRODUCT;
        index_serial_number: u8 = INDEX_SERIAL_NUMBER;
        num_configurations: u8 = NUM_CONFIGURATIONS;
    }
}

impl<B: AsRef<[u8]>> Device<B> {
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_as(&DEVICE, DescriptorType::Device, bytes).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::DEVICE_DUMP;
    use usb_layout::DecodeError;

    #[test]
    fn fields() {
        let d = Device::new(&DEVICE_DUMP[..]).unwrap();
        assert_eq!(d.usb(), 0x0200);
        assert_eq!(d.class(), ClassCode::PerInterface);
        assert_eq!(d.max_packet_size_0(), 64);
        assert_eq!(d.product(), 0x5678);
        assert_eq!(d.device(), 0x0100);
        assert_eq!(d.index_manufacturer(), 1);
        assert_eq!(d.index_serial_number(), 3);
        assert_eq!(d.num_configurations(), 1);
    }

    #[test]
    fn vendor_class_survives_rewrite() {
        let mut buf = DEVICE_DUMP;
        let mut d = Device::new(&mut buf[..]).unwrap();
        d.set_class(ClassCode::Unknown(0x42));
        d.set_vendor(0xbeef);
        assert_eq!(d.class(), ClassCode::Unknown(0x42));
        assert_eq!(buf[4], 0x42);
        assert_eq!(buf[8..10], [0xef, 0xbe]);
        assert_eq!(buf[10..], DEVICE_DUMP[10..]);
    }

    #[test]
    fn wrong_type() {
        let mut buf = DEVICE_DUMP;
        buf[1] = 0x02;
        assert_eq!(
            Device::new(&buf[..]).unwrap_err(),
            Error::UnexpectedType {
                descriptor: "device",
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn short() {
        assert!(matches!(
            Device::new(&DEVICE_DUMP[..17]),
            Err(Error::Malformed {
                descriptor: "device",
                source: DecodeError::TruncatedBuffer { needed: 18, actual: 17, .. }
            })
        ));
        let mut buf = DEVICE_DUMP;
        buf[0] = 0x11;
        assert!(matches!(
            Device::new(&buf[..]),
            Err(Error::Malformed {
                source: DecodeError::InvalidLength { length: 0x11, .. },
                ..
            })
        ));
    }
}
