//! Control setup packets and the standard requests a host sends to enumerate a device.
#![cfg_attr(not(test), no_std)]

use core::fmt;
use usb_descriptor::{DescriptorType, Direction};
use usb_layout::{
    Accessor, BitfieldSpec, Bits, DecodeError, FieldSpec, Struct, StructSchema, Typed,
};

usb_layout::codes! {
    pub enum Recipient: u8 {
        0 Device
        1 Interface
        2 Endpoint
        3 Other
    }
}

usb_layout::codes! {
    /// Bits 5 and 6 of `bmRequestType`. Code 3 is reserved.
    pub enum RequestKind: u8 {
        0 Standard
        1 Class
        2 Vendor
    }
}

usb_layout::codes! {
    pub enum StandardRequest: u8 {
        0x00 GetStatus
        0x01 ClearFeature
        0x03 SetFeature
        0x05 SetAddress
        0x06 GetDescriptor
        0x07 SetDescriptor
        0x08 GetConfiguration
        0x09 SetConfiguration
        0x0a GetInterface
        0x0b SetInterface
        0x0c SynchFrame
        0x30 SetSel
        0x31 SetIsochDelay
    }
}

const REQUEST_TYPE: FieldSpec = FieldSpec::u8("bmRequestType", 0);
const REQUEST: FieldSpec = FieldSpec::u8("bRequest", 1);
const VALUE: FieldSpec = FieldSpec::u16("wValue", 2);
const INDEX: FieldSpec = FieldSpec::u16("wIndex", 4);
const LENGTH: FieldSpec = FieldSpec::u16("wLength", 6);

const FIELDS: [FieldSpec; 5] = [REQUEST_TYPE, REQUEST, VALUE, INDEX, LENGTH];

pub const SETUP: StructSchema = StructSchema::checked("setup packet", 8, &FIELDS);

const RECIPIENT: Typed<Bits<FieldSpec>, Recipient> =
    Typed::new(Bits::new(REQUEST_TYPE, BitfieldSpec::checked(0x1f)));
const KIND: Typed<Bits<FieldSpec>, RequestKind> =
    Typed::new(Bits::new(REQUEST_TYPE, BitfieldSpec::checked(0x60)));
const DIRECTION: Typed<Bits<FieldSpec>, Direction> =
    Typed::new(Bits::new(REQUEST_TYPE, BitfieldSpec::bit(7)));
const STANDARD_REQUEST: Typed<FieldSpec, StandardRequest> = Typed::new(REQUEST);
const DESCRIPTOR_TYPE: Typed<Bits<FieldSpec>, DescriptorType> =
    Typed::new(Bits::new(VALUE, BitfieldSpec::checked(0xff00)));
const DESCRIPTOR_INDEX: Bits<FieldSpec> = Bits::new(VALUE, BitfieldSpec::checked(0x00ff));

/// A decoded setup packet. Every 8 bytes decode; unknown codes are kept.
#[derive(Clone, Copy)]
pub struct Setup<B>(Struct<'static, B>);

impl<B: AsRef<[u8]>> Setup<B> {
    pub fn new(bytes: B) -> Result<Self, DecodeError> {
        Struct::decode(&SETUP, bytes).map(Self)
    }

    pub fn view(&self) -> &Struct<'static, B> {
        &self.0
    }

    pub fn recipient(&self) -> Recipient {
        self.0.get(&RECIPIENT)
    }

    pub fn kind(&self) -> RequestKind {
        self.0.get(&KIND)
    }

    pub fn direction(&self) -> Direction {
        self.0.get(&DIRECTION)
    }

    /// `bRequest` read as a standard request. Only meaningful for
    /// [`RequestKind::Standard`].
    pub fn standard_request(&self) -> StandardRequest {
        self.0.get(&STANDARD_REQUEST)
    }

    pub fn value(&self) -> u16 {
        self.0.get(&VALUE) as u16
    }

    pub fn index(&self) -> u16 {
        self.0.get(&INDEX) as u16
    }

    /// Bytes to transfer in the data stage.
    pub fn length(&self) -> u16 {
        self.0.get(&LENGTH) as u16
    }

    /// High byte of `wValue` for descriptor requests.
    pub fn descriptor_type(&self) -> DescriptorType {
        self.0.get(&DESCRIPTOR_TYPE)
    }

    /// Low byte of `wValue` for descriptor requests.
    pub fn descriptor_index(&self) -> u8 {
        self.0.get(&DESCRIPTOR_INDEX) as u8
    }

    /// The request this packet makes, if it is one of [`Request`].
    pub fn request(&self) -> Option<Request> {
        if self.kind() != RequestKind::Standard {
            return None;
        }
        match (self.standard_request(), self.direction()) {
            (StandardRequest::GetDescriptor, Direction::In) => {
                let index = self.descriptor_index();
                let ty = match (self.descriptor_type(), self.recipient()) {
                    (DescriptorType::Device, Recipient::Device) => GetDescriptor::Device,
                    (DescriptorType::Configuration, Recipient::Device) => {
                        GetDescriptor::Configuration { index }
                    }
                    (DescriptorType::String, Recipient::Device) => GetDescriptor::String {
                        index,
                        language: self.index(),
                    },
                    (DescriptorType::Bos, Recipient::Device) => GetDescriptor::Bos,
                    (DescriptorType::Report, Recipient::Interface) => GetDescriptor::Report {
                        interface: self.index(),
                    },
                    _ => return None,
                };
                Some(Request::GetDescriptor {
                    ty,
                    length: self.length(),
                })
            }
            (StandardRequest::SetConfiguration, Direction::Out) => {
                Some(Request::SetConfiguration {
                    value: self.value() as u8,
                })
            }
            _ => None,
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Setup<B> {
    pub fn set_length(&mut self, length: u16) {
        self.0.set(&LENGTH, length.into())
    }
}

impl<B: AsRef<[u8]>> fmt::Debug for Setup<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!(Setup))
            .field("recipient", &self.recipient())
            .field("kind", &self.kind())
            .field("direction", &self.direction())
            .field("request", &format_args!("{:#04x}", self.0.get(&REQUEST)))
            .field("value", &format_args!("{:#06x}", self.value()))
            .field("index", &format_args!("{:#06x}", self.index()))
            .field("length", &self.length())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetDescriptor {
    Device,
    Configuration { index: u8 },
    String { index: u8, language: u16 },
    Bos,
    /// The HID report descriptor of an interface.
    Report { interface: u16 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    GetDescriptor { ty: GetDescriptor, length: u16 },
    SetConfiguration { value: u8 },
}

impl Request {
    /// The 8 bytes to send in the setup stage.
    pub fn into_setup(self) -> [u8; 8] {
        let mut raw = [0; 8];
        KIND.store(&mut raw, RequestKind::Standard);
        match self {
            Self::GetDescriptor { ty, length } => {
                let (recipient, descriptor, index, w_index) = match ty {
                    GetDescriptor::Device => (Recipient::Device, DescriptorType::Device, 0, 0),
                    GetDescriptor::Configuration { index } => {
                        (Recipient::Device, DescriptorType::Configuration, index, 0)
                    }
                    GetDescriptor::String { index, language } => {
                        (Recipient::Device, DescriptorType::String, index, language)
                    }
                    GetDescriptor::Bos => (Recipient::Device, DescriptorType::Bos, 0, 0),
                    GetDescriptor::Report { interface } => {
                        (Recipient::Interface, DescriptorType::Report, 0, interface)
                    }
                };
                DIRECTION.store(&mut raw, Direction::In);
                RECIPIENT.store(&mut raw, recipient);
                STANDARD_REQUEST.store(&mut raw, StandardRequest::GetDescriptor);
                DESCRIPTOR_TYPE.store(&mut raw, descriptor);
                DESCRIPTOR_INDEX.store(&mut raw, index.into());
                INDEX.store(&mut raw, w_index.into());
                LENGTH.store(&mut raw, length.into());
            }
            Self::SetConfiguration { value } => {
                DIRECTION.store(&mut raw, Direction::Out);
                RECIPIENT.store(&mut raw, Recipient::Device);
                STANDARD_REQUEST.store(&mut raw, StandardRequest::SetConfiguration);
                VALUE.store(&mut raw, value.into());
            }
        }
        raw
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::GetDescriptor { .. } => Direction::In,
            Self::SetConfiguration { .. } => Direction::Out,
        }
    }
}
