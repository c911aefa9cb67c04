//! Standard, BOS and audio class USB descriptors.
//!
//! Every descriptor is a view over the bytes the device returned; nothing is copied.
//! Views are generic over their buffer, so a `&mut [u8]` backed view can also be
//! written to.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
mod log;

/// Declares a descriptor view over `Struct` with one method per field.
///
/// Each field names a getter, an optional setter and the type its accessor is read
/// through.
macro_rules! view {
    {
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $get:ident $(/ $set:ident)?: $t:ty = $acc:expr;
            )*
        }
    } => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name<B>(::usb_layout::Struct<'static, B>);

        impl<B: AsRef<[u8]>> $name<B> {
            $(
                $(#[$fmeta])*
                pub fn $get(&self) -> $t {
                    self.0.get(&::usb_layout::Typed::<_, $t>::new($acc))
                }
            )*

            pub fn view(&self) -> &::usb_layout::Struct<'static, B> {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }

            pub fn into_inner(self) -> B {
                self.0.into_inner()
            }
        }

        impl<B: AsRef<[u8]> + AsMut<[u8]>> $name<B> {
            $($(
                pub fn $set(&mut self, value: $t) {
                    self.0.set(&::usb_layout::Typed::<_, $t>::new($acc), value)
                }
            )?)*
        }

        impl<B: AsRef<[u8]>> ::core::fmt::Debug for $name<B> {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.debug_struct(stringify!($name))
                    $(.field(stringify!($get), &self.$get()))*
                    .finish()
            }
        }
    };
}

pub mod audio;
pub mod bos;
mod class;
mod companion;
mod configuration;
mod device;
mod endpoint;
mod error;
mod interface;
mod string;
mod tree;

pub use class::*;
pub use companion::*;
pub use configuration::*;
pub use device::*;
pub use endpoint::*;
pub use error::Error;
pub use interface::*;
pub use string::*;
pub use tree::*;

use bos::{Bos, DeviceCapability};
use error::{MalformedSnafu, UnexpectedTypeSnafu};
use snafu::{ensure, ResultExt};
use usb_layout::{
    Block, BlockHeader, DecodeError, EnumCodec, Entry, FieldSpec, Registry, Scanner, Struct,
    StructSchema,
};

usb_layout::codes! {
    /// `bDescriptorType`.
    pub enum DescriptorType: u8 {
        0x01 Device
        0x02 Configuration
        0x03 String
        0x04 Interface
        0x05 Endpoint
        0x06 DeviceQualifier
        0x07 OtherSpeedConfiguration
        0x08 InterfacePower
        0x0f Bos
        0x10 DeviceCapability
        0x21 Hid
        0x22 Report
        0x23 Physical
        0x29 Hub
        0x2a SuperSpeedHub
        0x30 SsEndpointCompanion
    }
}

pub(crate) const LENGTH: FieldSpec = FieldSpec::u8("bLength", 0);
pub(crate) const DESCRIPTOR_TYPE: FieldSpec = FieldSpec::u8("bDescriptorType", 1);

/// `bLength` and `bDescriptorType`, common to every descriptor.
pub const HEADER: BlockHeader = BlockHeader::checked(LENGTH, DESCRIPTOR_TYPE);

const ENTRIES: [Entry<'static>; 8] = [
    Entry {
        discriminant: 0x01,
        schema: &DEVICE,
    },
    Entry {
        discriminant: 0x02,
        schema: &CONFIGURATION,
    },
    Entry {
        discriminant: 0x03,
        schema: &STRING,
    },
    Entry {
        discriminant: 0x04,
        schema: &INTERFACE,
    },
    Entry {
        discriminant: 0x05,
        schema: &ENDPOINT,
    },
    Entry {
        discriminant: 0x0f,
        schema: &bos::BOS,
    },
    Entry {
        discriminant: 0x10,
        schema: &bos::DEVICE_CAPABILITY,
    },
    Entry {
        discriminant: 0x30,
        schema: &SS_ENDPOINT_COMPANION,
    },
];

/// The standard descriptors, keyed by `bDescriptorType`.
pub const STANDARD: Registry<'static> = Registry::new(HEADER, &ENTRIES);

/// Decodes `bytes` as a descriptor of type `ty`, checking `bLength` against both the
/// schema and the buffer.
pub(crate) fn decode_as<B: AsRef<[u8]>, T: EnumCodec<Raw = u8>>(
    schema: &'static StructSchema,
    ty: T,
    bytes: B,
) -> Result<Struct<'static, B>, Error> {
    let view = decode_sized(schema, bytes)?;
    let found = view.get(&DESCRIPTOR_TYPE) as u8;
    ensure!(
        found == ty.code(),
        UnexpectedTypeSnafu {
            descriptor: schema.name(),
            expected: ty.code(),
            found,
        }
    );
    Ok(view)
}

/// Decodes `bytes` as a descriptor with any type.
pub(crate) fn decode_sized<B: AsRef<[u8]>>(
    schema: &'static StructSchema,
    bytes: B,
) -> Result<Struct<'static, B>, Error> {
    let descriptor = schema.name();
    let view = Struct::decode(schema, bytes).context(MalformedSnafu { descriptor })?;
    let length = view.get(&LENGTH);
    if length < schema.size() as u64 || length > view.as_bytes().len() as u64 {
        return Err(Error::Malformed {
            descriptor,
            source: DecodeError::InvalidLength {
                field: LENGTH.name,
                length,
            },
        });
    }
    Ok(view)
}

#[derive(Debug)]
pub enum Descriptor<'a> {
    Device(Device<&'a [u8]>),
    Configuration(Configuration<&'a [u8]>),
    String(StringDescriptor<&'a [u8]>),
    Interface(Interface<&'a [u8]>),
    Endpoint(Endpoint<&'a [u8]>),
    SsEndpointCompanion(SsEndpointCompanion<&'a [u8]>),
    Bos(Bos<&'a [u8]>),
    DeviceCapability(DeviceCapability<&'a [u8]>),
    Unknown { ty: u8, data: &'a [u8] },
}

macro_rules! into {
    ($v:ident $f:ident $t:ty) => {
        pub fn $f(self) -> Option<$t> {
            match self {
                Self::$v(v) => Some(v),
                _ => None,
            }
        }
    };
}

impl<'a> Descriptor<'a> {
    into!(Device into_device Device<&'a [u8]>);
    into!(Configuration into_configuration Configuration<&'a [u8]>);
    into!(String into_string StringDescriptor<&'a [u8]>);
    into!(Interface into_interface Interface<&'a [u8]>);
    into!(Endpoint into_endpoint Endpoint<&'a [u8]>);
    into!(Bos into_bos Bos<&'a [u8]>);

    fn from_block(block: Block<'static, 'a>) -> Result<Self, Error> {
        let bytes = block.as_bytes();
        Ok(match DescriptorType::decode(block.discriminant() as u8) {
            DescriptorType::Device => Self::Device(Device::new(bytes)?),
            DescriptorType::Configuration => Self::Configuration(Configuration::new(bytes)?),
            DescriptorType::String => Self::String(StringDescriptor::new(bytes)?),
            DescriptorType::Interface => Self::Interface(Interface::new(bytes)?),
            DescriptorType::Endpoint => Self::Endpoint(Endpoint::new(bytes)?),
            DescriptorType::SsEndpointCompanion => {
                Self::SsEndpointCompanion(SsEndpointCompanion::new(bytes)?)
            }
            DescriptorType::Bos => Self::Bos(Bos::new(bytes)?),
            DescriptorType::DeviceCapability => {
                Self::DeviceCapability(DeviceCapability::new(bytes)?)
            }
            ty => Self::Unknown {
                ty: ty.code(),
                data: &bytes[HEADER.size()..],
            },
        })
    }
}

/// Walks the descriptors packed back to back in `buf`, such as a full configuration.
///
/// A descriptor that is too short for its type is yielded as an error and the walk
/// goes on. A length that escapes `buf` ends the walk.
pub fn decode(buf: &[u8]) -> Iter<'_> {
    Iter {
        scanner: STANDARD.scan(buf),
    }
}

pub struct Iter<'a> {
    scanner: Scanner<'static, 'a>,
}

impl<'a> Iter<'a> {
    /// Offset of the next descriptor.
    pub fn offset(&self) -> usize {
        self.scanner.offset()
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<Descriptor<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scanner
            .next()
            .map(|r| r.map_err(Error::scan).and_then(Descriptor::from_block))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloc::vec::Vec;
    use quickcheck_macros::quickcheck;

    /// A full-speed keyboard configuration with a HID class descriptor between the
    /// interface and its endpoint.
    pub const KEYBOARD: &[u8] = &[
        0x09, 0x02, 0x22, 0x00, 0x01, 0x01, 0x00, 0xa0, 0x32, // configuration
        0x09, 0x04, 0x00, 0x00, 0x01, 0x03, 0x01, 0x01, 0x00, // interface
        0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x3f, 0x00, // hid
        0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x0a, // endpoint
    ];

    pub const DEVICE_DUMP: [u8; 18] = [
        0x12, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x40, 0x34, 0x12, 0x78, 0x56, 0x00, 0x01, 0x01,
        0x02, 0x03, 0x01,
    ];

    #[test]
    fn keyboard() {
        let mut it = decode(KEYBOARD);
        let c = it.next().unwrap().unwrap().into_configuration().unwrap();
        assert_eq!(c.total_length(), 34);
        let i = it.next().unwrap().unwrap().into_interface().unwrap();
        assert_eq!(i.class(), ClassCode::Hid);
        match it.next().unwrap().unwrap() {
            Descriptor::Unknown { ty: 0x21, data } => assert_eq!(data.len(), 7),
            d => panic!("unexpected {:?}", d),
        }
        let e = it.next().unwrap().unwrap().into_endpoint().unwrap();
        assert_eq!(e.direction(), Direction::In);
        assert_eq!(e.number(), 1);
        assert_eq!(e.transfer(), EndpointTransfer::Interrupt);
        assert!(it.next().is_none());
        assert_eq!(it.offset(), KEYBOARD.len());
    }

    #[test]
    fn device_scenario() {
        let mut it = decode(&DEVICE_DUMP);
        let d = it.next().unwrap().unwrap().into_device().unwrap();
        assert_eq!(d.descriptor_type(), DescriptorType::Device);
        assert_eq!(d.vendor(), 0x1234);
        assert_eq!(d.view().encode(), DEVICE_DUMP);
    }

    #[test]
    fn short_descriptor_then_more() {
        let buf = [0x05, 0x04, 0, 0, 0, 0x02, 0x99];
        let r: alloc::vec::Vec<_> = decode(&buf).collect();
        assert_eq!(r.len(), 2);
        assert!(matches!(
            &r[0],
            Err(Error::Malformed {
                descriptor: "interface",
                source: DecodeError::TruncatedBuffer { .. }
            })
        ));
        assert!(matches!(r[1], Ok(Descriptor::Unknown { ty: 0x99, data: [] })));
    }

    #[test]
    fn corrupt_length() {
        let r: alloc::vec::Vec<_> = decode(&[0x09, 0x04, 0, 0]).collect();
        assert!(matches!(
            r[..],
            [Err(Error::Corrupt {
                source: DecodeError::CorruptCollection { offset: 0, length: 9, total: 4 }
            })]
        ));
        assert_eq!(
            alloc::string::ToString::to_string(&r[0].as_ref().unwrap_err()),
            "corrupt descriptor list: block at offset 0 declares length 9, buffer ends at 4"
        );
    }

    const SCHEMAS: &[&StructSchema] = &[
        &DEVICE,
        &CONFIGURATION,
        &INTERFACE,
        &ENDPOINT,
        &AUDIO_ENDPOINT,
        &SS_ENDPOINT_COMPANION,
        &STRING,
        &bos::BOS,
        &bos::DEVICE_CAPABILITY,
        &bos::USB2_EXTENSION,
        &bos::SUPERSPEED_USB,
        &bos::CONTAINER_ID,
        &audio::CLASS_SPECIFIC,
        &audio::INTERRUPT_DATA,
        &audio::CLUSTER,
        &audio::INPUT_TERMINAL,
        &audio::OUTPUT_TERMINAL,
        &audio::CONTROL_HEADER,
        &audio::MIXER_UNIT,
        &audio::SELECTOR_UNIT,
        &audio::FEATURE_UNIT,
        &audio::PROCESSING_UNIT,
        &audio::EXTENSION_UNIT,
        &audio::ASSOC_INTERFACE,
        &audio::STREAMING_GENERAL,
        &audio::ISO_ENDPOINT,
    ];

    #[quickcheck]
    fn every_schema_round_trips(bytes: Vec<u8>) -> bool {
        SCHEMAS.iter().all(|schema| {
            let mut buf = bytes.clone();
            while buf.len() < schema.size() {
                buf.push(buf.len() as u8 ^ 0x5a);
            }
            match schema.decode(&buf[..]) {
                Ok(s) => s.encode() == buf,
                Err(_) => false,
            }
        })
    }
}
