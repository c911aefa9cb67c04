use super::{decode_subtype, CsType, EndpointSubtype, StreamingSubtype, CLASS_SPECIFIC, SUBTYPE};
use crate::{decode_as, Error, DESCRIPTOR_TYPE, LENGTH};
use usb_layout::{BitfieldSpec, Bits, EnumCodec, FieldSpec, StructSchema};

const TERMINAL_LINK: FieldSpec = FieldSpec::u8("bTerminalLink", 3);
const DELAY: FieldSpec = FieldSpec::u8("bDelay", 4);
const FORMAT_TAG: FieldSpec = FieldSpec::u16("wFormatTag", 5);
const GENERAL_FIELDS: [FieldSpec; 6] =
    [LENGTH, DESCRIPTOR_TYPE, SUBTYPE, TERMINAL_LINK, DELAY, FORMAT_TAG];

pub const STREAMING_GENERAL: StructSchema =
    StructSchema::checked("AudioStreaming general", 7, &GENERAL_FIELDS);

view! {
    pub struct StreamingGeneral {
        /// The terminal this interface's endpoint is connected to.
        terminal_link: u8 = TERMINAL_LINK;
        /// In frames.
        delay: u8 = DELAY;
        format_tag: u16 = FORMAT_TAG;
    }
}

impl<B: AsRef<[u8]>> StreamingGeneral<B> {
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_subtype(
            &STREAMING_GENERAL,
            CsType::Interface,
            StreamingSubtype::General,
            bytes,
        )
        .map(Self)
    }
}

usb_layout::codes! {
    pub enum LockDelayUnits: u8 {
        0 Undefined
        1 Milliseconds
        2 DecodedPcmSamples
    }
}

const ATTRIBUTES: FieldSpec = FieldSpec::u8("bmAttributes", 3);
const LOCK_DELAY_UNITS: FieldSpec = FieldSpec::u8("bLockDelayUnits", 4);
const LOCK_DELAY: FieldSpec = FieldSpec::u16("wLockDelay", 5);
const ISO_ENDPOINT_FIELDS: [FieldSpec; 6] =
    [LENGTH, DESCRIPTOR_TYPE, SUBTYPE, ATTRIBUTES, LOCK_DELAY_UNITS, LOCK_DELAY];

pub const ISO_ENDPOINT: StructSchema =
    StructSchema::checked("AudioStreaming isochronous endpoint", 7, &ISO_ENDPOINT_FIELDS);

view! {
    pub struct IsoEndpoint {
        attributes: u8 = ATTRIBUTES;
        sampling_frequency / set_sampling_frequency: bool =
            Bits::new(ATTRIBUTES, BitfieldSpec::bit(0));
        pitch / set_pitch: bool = Bits::new(ATTRIBUTES, BitfieldSpec::bit(1));
        /// Packets must be padded to `wMaxPacketSize`.
        max_packets_only: bool = Bits::new(ATTRIBUTES, BitfieldSpec::bit(7));
        lock_delay_units: LockDelayUnits = LOCK_DELAY_UNITS;
        lock_delay: u16 = LOCK_DELAY;
    }
}

impl<B: AsRef<[u8]>> IsoEndpoint<B> {
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_subtype(
            &ISO_ENDPOINT,
            CsType::Endpoint,
            EndpointSubtype::General,
            bytes,
        )
        .map(Self)
    }
}

/// A class-specific AudioStreaming interface descriptor.
#[derive(Clone, Copy, Debug)]
pub enum AudioStreaming<'a> {
    General(StreamingGeneral<&'a [u8]>),
    /// Format type and format specific descriptors depend on `wFormatTag`, and are
    /// left to the caller.
    Opaque {
        subtype: StreamingSubtype,
        data: &'a [u8],
    },
}

impl<'a> AudioStreaming<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let header = decode_as(&CLASS_SPECIFIC, CsType::Interface, bytes)?;
        let data = &bytes[..header.get(&LENGTH) as usize];
        Ok(match StreamingSubtype::decode(header.get(&SUBTYPE) as u8) {
            StreamingSubtype::General => Self::General(StreamingGeneral::new(data)?),
            subtype => Self::Opaque { subtype, data },
        })
    }
}
