use crate::{decode_as, ClassCode, DescriptorType, Error, DESCRIPTOR_TYPE, LENGTH};
use usb_layout::{FieldSpec, StructSchema};

const NUMBER: FieldSpec = FieldSpec::u8("bInterfaceNumber", 2);
const ALTERNATE_SETTING: FieldSpec = FieldSpec::u8("bAlternateSetting", 3);
const NUM_ENDPOINTS: FieldSpec = FieldSpec::u8("bNumEndpoints", 4);
const CLASS: FieldSpec = FieldSpec::u8("bInterfaceClass", 5);
const SUBCLASS: FieldSpec = FieldSpec::u8("bInterfaceSubClass", 6);
const PROTOCOL: FieldSpec = FieldSpec::u8("bInterfaceProtocol", 7);
const INDEX: FieldSpec = FieldSpec::u8("iInterface", 8);

const FIELDS: [FieldSpec; 9] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    NUMBER,
    ALTERNATE_SETTING,
    NUM_ENDPOINTS,
    CLASS,
    SUBCLASS,
    PROTOCOL,
    INDEX,
];

pub const INTERFACE: StructSchema = StructSchema::checked("interface", 9, &FIELDS);

view! {
    pub struct Interface {
        number: u8 = NUMBER;
        alternate_setting: u8 = ALTERNATE_SETTING;
        num_endpoints: u8 = NUM_ENDPOINTS;
        class: ClassCode = CLASS;
        /// Meaning depends on `class`, see [`audio::Subclass`](crate::audio::Subclass).
        subclass: u8 = SUBCLASS;
        protocol: u8 = PROTOCOL;
        index: u8 = INDEX;
    }
}

impl<B: AsRef<[u8]>> Interface<B> {
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_as(&INTERFACE, DescriptorType::Interface, bytes).map(Self)
    }
}
