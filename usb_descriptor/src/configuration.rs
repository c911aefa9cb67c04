use crate::{decode_as, DescriptorType, Error, DESCRIPTOR_TYPE, LENGTH};
use core::fmt;
use usb_layout::{flags_codec, Bits, BitfieldSpec, FieldSpec, StructSchema};

const TOTAL_LENGTH: FieldSpec = FieldSpec::u16("wTotalLength", 2);
const NUM_INTERFACES: FieldSpec = FieldSpec::u8("bNumInterfaces", 4);
const CONFIGURATION_VALUE: FieldSpec = FieldSpec::u8("bConfigurationValue", 5);
const INDEX_CONFIGURATION: FieldSpec = FieldSpec::u8("iConfiguration", 6);
const ATTRIBUTES: FieldSpec = FieldSpec::u8("bmAttributes", 7);
const MAX_POWER: FieldSpec = FieldSpec::u8("bMaxPower", 8);

const FIELDS: [FieldSpec; 8] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    TOTAL_LENGTH,
    NUM_INTERFACES,
    CONFIGURATION_VALUE,
    INDEX_CONFIGURATION,
    ATTRIBUTES,
    MAX_POWER,
];

pub const CONFIGURATION: StructSchema = StructSchema::checked("configuration", 9, &FIELDS);

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConfigurationAttributes: u8 {
        const REMOTE_WAKEUP = 1 << 5;
        const SELF_POWERED = 1 << 6;
        /// Must be set.
        const RESERVED = 1 << 7;
    }
}

flags_codec!(ConfigurationAttributes: u8);

impl fmt::Debug for ConfigurationAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_set();
        for (name, _) in self.iter_names() {
            f.entry(&format_args!("{}", name));
        }
        let unknown = self.bits() & !Self::all().bits();
        if unknown != 0 {
            f.entry(&format_args!("{:#04x}", unknown));
        }
        f.finish()
    }
}

view! {
    pub struct Configuration {
        descriptor_type: DescriptorType = DESCRIPTOR_TYPE;
        /// Length of this descriptor and everything that belongs to it.
        total_length / set_total_length: u16 = TOTAL_LENGTH;
        num_interfaces: u8 = NUM_INTERFACES;
        /// Value which when used as an argument in the SET_CONFIGURATION request,
        /// causes the device to assume the configuration described by this descriptor.
        configuration_value: u8 = CONFIGURATION_VALUE;
        index_configuration: u8 = INDEX_CONFIGURATION;
        attributes / set_attributes: ConfigurationAttributes = ATTRIBUTES;
        self_powered / set_self_powered: bool = Bits::new(ATTRIBUTES, BitfieldSpec::bit(6));
        remote_wakeup / set_remote_wakeup: bool = Bits::new(ATTRIBUTES, BitfieldSpec::bit(5));
        /// In units of 2 mA.
        max_power / set_max_power: u8 = MAX_POWER;
    }
}

impl<B: AsRef<[u8]>> Configuration<B> {
    /// Decodes the configuration descriptor at the start of `bytes`. Everything
    /// after it is left in the view's tail.
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_as(&CONFIGURATION, DescriptorType::Configuration, bytes).map(Self)
    }

    pub fn max_power_ma(&self) -> u16 {
        u16::from(self.max_power()) * 2
    }
}
