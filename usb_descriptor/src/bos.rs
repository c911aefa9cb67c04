//! Binary device object store: a header followed by device capability descriptors.
//!
//! [`Bos::device_capabilities`] walks the capabilities as the header counts them.
//! [`Bos::capabilities`] scans them by `bDevCapabilityType` instead, decoding the
//! kinds in [`CAPABILITIES`] and keeping the rest opaque.

use crate::{
    decode_as, decode_sized, error::MalformedSnafu, DescriptorType, Error, DESCRIPTOR_TYPE,
    LENGTH,
};
use core::iter::FusedIterator;
use snafu::ResultExt;
use usb_layout::{
    flags_codec, Block, BlockHeader, CountSource, Element, Entry, FieldSpec, Registry,
    Scanner, StructSchema, VariableArraySpec, Width,
};

const TOTAL_LENGTH: FieldSpec = FieldSpec::u16("wTotalLength", 2);
const NUM_DEVICE_CAPS: FieldSpec = FieldSpec::u8("bNumDeviceCaps", 4);
const CAPABILITY_TYPE: FieldSpec = FieldSpec::u8("bDevCapabilityType", 2);

const BOS_FIELDS: [FieldSpec; 4] = [LENGTH, DESCRIPTOR_TYPE, TOTAL_LENGTH, NUM_DEVICE_CAPS];
const CAPABILITY_FIELDS: [FieldSpec; 3] = [LENGTH, DESCRIPTOR_TYPE, CAPABILITY_TYPE];

/// Generic device capability: the common header, then capability specific data.
pub const DEVICE_CAPABILITY: StructSchema =
    StructSchema::checked("device capability", 3, &CAPABILITY_FIELDS);

const CAPABILITY_LIST: VariableArraySpec = VariableArraySpec::checked(
    "dev_capability",
    CountSource::Field(NUM_DEVICE_CAPS),
    Element::Sized {
        schema: &DEVICE_CAPABILITY,
        length: LENGTH,
    },
);

pub const BOS: StructSchema =
    StructSchema::checked("BOS", 5, &BOS_FIELDS).with_trailing(CAPABILITY_LIST);

usb_layout::codes! {
    /// `bDevCapabilityType`.
    pub enum CapabilityType: u8 {
        0x01 WirelessUsb
        0x02 Usb2Extension
        0x03 SuperSpeedUsb
        0x04 ContainerId
    }
}

view! {
    pub struct Bos {
        /// Length of this descriptor and all of its capabilities.
        total_length: u16 = TOTAL_LENGTH;
        num_device_caps: u8 = NUM_DEVICE_CAPS;
    }
}

impl<B: AsRef<[u8]>> Bos<B> {
    /// Decodes the BOS header at the start of `bytes`, which normally also hold the
    /// capabilities.
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_as(&BOS, DescriptorType::Bos, bytes).map(Self)
    }

    /// The capability bytes, limited to `wTotalLength`.
    fn capability_bytes(&self) -> &[u8] {
        let end = usize::from(self.total_length()).min(self.0.as_bytes().len());
        self.0.as_bytes().get(BOS.size()..end).unwrap_or_default()
    }

    /// The `bNumDeviceCaps` capabilities following the header.
    pub fn device_capabilities(
        &self,
    ) -> Result<impl Iterator<Item = DeviceCapability<&[u8]>> + '_, Error> {
        let array = CAPABILITY_LIST
            .resolve(self.0.fixed_bytes(), self.capability_bytes())
            .context(MalformedSnafu {
                descriptor: BOS.name(),
            })?;
        Ok(array.structs().map(DeviceCapability))
    }

    /// Every capability up to `wTotalLength`, decoded by type.
    pub fn capabilities(&self) -> Capabilities<'_> {
        Capabilities(CAPABILITIES.scan(self.capability_bytes()))
    }
}

view! {
    pub struct DeviceCapability {
        capability_type: CapabilityType = CAPABILITY_TYPE;
    }
}

impl<B: AsRef<[u8]>> DeviceCapability<B> {
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_as(&DEVICE_CAPABILITY, DescriptorType::DeviceCapability, bytes).map(Self)
    }

    /// Capability specific data.
    pub fn data(&self) -> &[u8] {
        self.0.tail()
    }

    pub fn decode(&self) -> Result<Capability<'_>, Error> {
        Capability::from_bytes(self.0.as_bytes())
    }
}

const U2_ATTRIBUTES: FieldSpec = FieldSpec::u32("bmAttributes", 3);
const USB2_EXTENSION_FIELDS: [FieldSpec; 4] =
    [LENGTH, DESCRIPTOR_TYPE, CAPABILITY_TYPE, U2_ATTRIBUTES];
pub const USB2_EXTENSION: StructSchema =
    StructSchema::checked("USB 2.0 extension", 7, &USB2_EXTENSION_FIELDS);

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Usb2ExtensionAttributes: u32 {
        /// Link power management.
        const LPM = 1 << 1;
    }
}

view! {
    pub struct Usb2Extension {
        attributes: Usb2ExtensionAttributes = U2_ATTRIBUTES;
    }
}

const SS_ATTRIBUTES: FieldSpec = FieldSpec::u8("bmAttributes", 3);
const SPEEDS_SUPPORTED: FieldSpec = FieldSpec::u16("wSpeedSupported", 4);
const FUNCTIONALITY_SUPPORT: FieldSpec = FieldSpec::u8("bFunctionalitySupport", 6);
const U1_DEV_EXIT_LAT: FieldSpec = FieldSpec::u8("bU1DevExitLat", 7);
const U2_DEV_EXIT_LAT: FieldSpec = FieldSpec::u16("wU2DevExitLat", 8);
const SUPERSPEED_FIELDS: [FieldSpec; 8] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    CAPABILITY_TYPE,
    SS_ATTRIBUTES,
    SPEEDS_SUPPORTED,
    FUNCTIONALITY_SUPPORT,
    U1_DEV_EXIT_LAT,
    U2_DEV_EXIT_LAT,
];
pub const SUPERSPEED_USB: StructSchema =
    StructSchema::checked("SuperSpeed USB device capability", 10, &SUPERSPEED_FIELDS);

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SuperSpeedAttributes: u8 {
        /// Latency tolerance messages.
        const LTM = 1 << 1;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Speeds: u16 {
        const LOW = 1 << 0;
        const FULL = 1 << 1;
        const HIGH = 1 << 2;
        const SUPER = 1 << 3;
    }
}

flags_codec!(
    Usb2ExtensionAttributes: u32,
    SuperSpeedAttributes: u8,
    Speeds: u16,
);

view! {
    pub struct SuperSpeedUsb {
        attributes: SuperSpeedAttributes = SS_ATTRIBUTES;
        speeds_supported: Speeds = SPEEDS_SUPPORTED;
        /// Lowest speed at which all functionality is available.
        functionality_support: u8 = FUNCTIONALITY_SUPPORT;
        /// In microseconds.
        u1_dev_exit_lat: u8 = U1_DEV_EXIT_LAT;
        /// In microseconds.
        u2_dev_exit_lat: u16 = U2_DEV_EXIT_LAT;
    }
}

const RESERVED: FieldSpec = FieldSpec::u8("bReserved", 3);
const CONTAINER_ID_FIELD: FieldSpec = FieldSpec::array("ContainerID", 4, Width::U8, 16);
const CONTAINER_ID_FIELDS: [FieldSpec; 5] =
    [LENGTH, DESCRIPTOR_TYPE, CAPABILITY_TYPE, RESERVED, CONTAINER_ID_FIELD];
pub const CONTAINER_ID: StructSchema =
    StructSchema::checked("container ID", 20, &CONTAINER_ID_FIELDS);

view! {
    pub struct ContainerId {
        reserved: u8 = RESERVED;
    }
}

impl<B: AsRef<[u8]>> ContainerId<B> {
    /// A UUID unique to this device instance, in the order it is sent.
    pub fn container_id(&self) -> [u8; 16] {
        let mut id = [0; 16];
        id.copy_from_slice(self.0.array(&CONTAINER_ID_FIELD).as_bytes());
        id
    }
}

/// `bLength` and `bDevCapabilityType`.
pub const CAPABILITY_HEADER: BlockHeader = BlockHeader::checked(LENGTH, CAPABILITY_TYPE);

const ENTRIES: [Entry<'static>; 3] = [
    Entry {
        discriminant: 0x02,
        schema: &USB2_EXTENSION,
    },
    Entry {
        discriminant: 0x03,
        schema: &SUPERSPEED_USB,
    },
    Entry {
        discriminant: 0x04,
        schema: &CONTAINER_ID,
    },
];

/// Device capabilities keyed by `bDevCapabilityType`.
pub const CAPABILITIES: Registry<'static> = Registry::new(CAPABILITY_HEADER, &ENTRIES);

#[derive(Debug)]
pub enum Capability<'a> {
    Usb2Extension(Usb2Extension<&'a [u8]>),
    SuperSpeed(SuperSpeedUsb<&'a [u8]>),
    ContainerId(ContainerId<&'a [u8]>),
    Opaque(DeviceCapability<&'a [u8]>),
}

impl<'a> Capability<'a> {
    /// Decodes one capability descriptor by its type.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, Error> {
        let generic = DeviceCapability::new(bytes)?;
        let schema = CAPABILITIES.lookup(u8::from(generic.capability_type()).into());
        Self::typed(schema, generic)
    }

    fn typed(
        schema: Option<&'static StructSchema>,
        generic: DeviceCapability<&'a [u8]>,
    ) -> Result<Self, Error> {
        let Some(schema) = schema else {
            return Ok(Self::Opaque(generic));
        };
        let view = decode_sized(schema, generic.into_inner())?;
        Ok(match generic.capability_type() {
            CapabilityType::Usb2Extension => Self::Usb2Extension(Usb2Extension(view)),
            CapabilityType::SuperSpeedUsb => Self::SuperSpeed(SuperSpeedUsb(view)),
            CapabilityType::ContainerId => Self::ContainerId(ContainerId(view)),
            _ => Self::Opaque(generic),
        })
    }
}

/// Typed capabilities of a [`Bos`]. A corrupt length ends the iteration.
pub struct Capabilities<'a>(Scanner<'static, 'a>);

impl<'a> Iterator for Capabilities<'a> {
    type Item = Result<Capability<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|r| {
            let block = r.map_err(Error::scan)?;
            let generic = DeviceCapability::new(block.as_bytes())?;
            let schema = match block {
                Block::Known { view, .. } => Some(view.schema()),
                Block::Opaque(_) => None,
            };
            Capability::typed(schema, generic)
        })
    }
}

impl FusedIterator for Capabilities<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, Descriptor};
    use alloc::vec::Vec;
    use usb_layout::DecodeError;

    const SUPERSPEED_BOS: [u8; 26] = [
        0x05, 0x0f, 0x1a, 0x00, 0x03, // BOS
        0x07, 0x10, 0x02, 0x02, 0x00, 0x00, 0x00, // USB 2.0 extension
        0x0a, 0x10, 0x03, 0x00, 0x0e, 0x00, 0x01, 0x0a, 0xff, 0x07, // SuperSpeed
        0x04, 0x10, 0x05, 0x00, // platform
    ];

    fn container_id_descriptor() -> [u8; 20] {
        let mut buf = [0; 20];
        buf[..4].copy_from_slice(&[0x14, 0x10, 0x04, 0x00]);
        for (i, b) in buf[4..].iter_mut().enumerate() {
            *b = i as u8;
        }
        buf
    }

    #[test]
    fn counted_capabilities() {
        let bos = Bos::new(&SUPERSPEED_BOS[..]).unwrap();
        assert_eq!(bos.total_length(), 26);
        let caps: Vec<_> = bos.device_capabilities().unwrap().collect();
        let kinds: Vec<_> = caps.iter().map(|c| c.capability_type()).collect();
        assert_eq!(
            kinds,
            [
                CapabilityType::Usb2Extension,
                CapabilityType::SuperSpeedUsb,
                CapabilityType::Unknown(5)
            ]
        );
        assert_eq!(caps[0].data(), [0x02, 0x00, 0x00, 0x00]);
        assert_eq!(caps[2].data(), [0x00]);
    }

    #[test]
    fn typed_capabilities() {
        let bos = Bos::new(&SUPERSPEED_BOS[..]).unwrap();
        let caps: Vec<_> = bos.capabilities().collect::<Result<_, _>>().unwrap();
        assert_eq!(caps.len(), 3);
        match &caps[0] {
            Capability::Usb2Extension(u) => assert_eq!(u.attributes(), Usb2ExtensionAttributes::LPM),
            c => panic!("unexpected {:?}", c),
        }
        match &caps[1] {
            Capability::SuperSpeed(s) => {
                assert_eq!(s.speeds_supported(), Speeds::FULL | Speeds::HIGH | Speeds::SUPER);
                assert_eq!(s.functionality_support(), 1);
                assert_eq!(s.u1_dev_exit_lat(), 10);
                assert_eq!(s.u2_dev_exit_lat(), 0x07ff);
                assert!(s.attributes().is_empty());
            }
            c => panic!("unexpected {:?}", c),
        }
        match &caps[2] {
            Capability::Opaque(o) => assert_eq!(o.capability_type(), CapabilityType::Unknown(5)),
            c => panic!("unexpected {:?}", c),
        }
    }

    #[test]
    fn total_length_limits_capabilities() {
        let mut buf = SUPERSPEED_BOS;
        buf[2] = 12;
        let bos = Bos::new(&buf[..]).unwrap();
        assert_eq!(bos.capabilities().count(), 1);
        assert!(matches!(
            bos.device_capabilities().map(|_| ()),
            Err(Error::Malformed {
                descriptor: "BOS",
                source: DecodeError::TruncatedArray { count: 3, .. }
            })
        ));
    }

    #[test]
    fn container() {
        let buf = container_id_descriptor();
        match Capability::from_bytes(&buf).unwrap() {
            Capability::ContainerId(c) => {
                assert_eq!(c.reserved(), 0);
                assert_eq!(c.container_id()[..4], [0, 1, 2, 3]);
                assert_eq!(c.container_id()[15], 15);
            }
            c => panic!("unexpected {:?}", c),
        }
    }

    #[test]
    fn short_capability() {
        let e = Capability::from_bytes(&[0x06, 0x10, 0x02, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(matches!(
            e,
            Error::Malformed {
                descriptor: "USB 2.0 extension",
                source: DecodeError::TruncatedBuffer { needed: 7, actual: 6, .. }
            }
        ));
        assert!(matches!(
            Capability::from_bytes(&[0x07, 0x04, 0x02, 0, 0, 0, 0]),
            Err(Error::UnexpectedType { expected: 0x10, found: 0x04, .. })
        ));
    }

    #[test]
    fn in_descriptor_list() {
        let mut it = decode(&SUPERSPEED_BOS);
        match it.next() {
            Some(Ok(Descriptor::Bos(b))) => assert_eq!(b.num_device_caps(), 3),
            d => panic!("unexpected {:?}", d),
        }
        let kinds: Vec<_> = it
            .map(|d| match d {
                Ok(Descriptor::DeviceCapability(c)) => c.capability_type(),
                d => panic!("unexpected {:?}", d),
            })
            .collect();
        assert_eq!(kinds.len(), 3);
    }
}
