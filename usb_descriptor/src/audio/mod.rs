//! USB Audio 1.0 class-specific descriptors.
//!
//! Fixed descriptors are views like the standard ones. Units whose fixed fields come
//! after variable-length lists are decoded in stages and hold the parts they found.

use crate::{
    decode_as,
    error::{MalformedSnafu, UnexpectedSubtypeSnafu},
    Error, DESCRIPTOR_TYPE, HEADER, LENGTH,
};
use snafu::{ensure, ResultExt};
use usb_layout::{
    flags_codec, BitfieldSpec, Bits, EnumCodec, FieldSpec, Registry, Struct, StructSchema,
};

mod control;
mod streaming;

pub use control::*;
pub use streaming::*;

usb_layout::codes! {
    /// `bInterfaceSubClass` of audio interfaces.
    pub enum Subclass: u8 {
        0x00 Undefined
        0x01 AudioControl
        0x02 AudioStreaming
        0x03 MidiStreaming
    }
}

usb_layout::codes! {
    /// `bDescriptorType` of class-specific descriptors.
    pub enum CsType: u8 {
        0x20 Undefined
        0x21 Device
        0x22 Configuration
        0x23 String
        0x24 Interface
        0x25 Endpoint
        0x26 Cluster
    }
}

usb_layout::codes! {
    /// `bDescriptorSubtype` of AudioControl interface descriptors.
    pub enum ControlSubtype: u8 {
        0x00 Undefined
        0x01 Header
        0x02 InputTerminal
        0x03 OutputTerminal
        0x04 Mixer
        0x05 Selector
        0x06 Feature
        0x07 Processing
        0x08 Extension
        0x09 AssocInterface
    }
}

usb_layout::codes! {
    /// `bDescriptorSubtype` of AudioStreaming interface descriptors.
    pub enum StreamingSubtype: u8 {
        0x00 Undefined
        0x01 General
        0x02 FormatType
        0x03 FormatSpecific
    }
}

usb_layout::codes! {
    /// `bDescriptorSubtype` of class-specific endpoint descriptors.
    pub enum EndpointSubtype: u8 {
        0x00 Undefined
        0x01 General
    }
}

usb_layout::codes! {
    /// `wProcessType` of processing units.
    pub enum ProcessType: u16 {
        0x00 Undefined
        0x01 UpDownMix
        0x02 DolbyPrologic
        0x03 Stereo3dExtender
        0x04 Reverberation
        0x05 Chorus
        0x06 DynRangeComp
    }
}

usb_layout::codes! {
    /// `wTerminalType`.
    pub enum TerminalType: u16 {
        0x0100 UsbUndefined
        0x0101 UsbStreaming
        0x01ff UsbVendorSpecific
        0x0200 InputUndefined
        0x0201 Microphone
        0x0202 DesktopMicrophone
        0x0203 PersonalMicrophone
        0x0204 OmniDirectionalMicrophone
        0x0205 MicrophoneArray
        0x0300 OutputUndefined
        0x0301 Speaker
        0x0302 Headphones
        0x0303 HeadMountedDisplayAudio
        0x0304 DesktopSpeaker
        0x0305 RoomSpeaker
        0x0306 CommunicationSpeaker
        0x0307 LowFrequencyEffectsSpeaker
    }
}

usb_layout::codes! {
    /// Class-specific `bRequest` codes.
    pub enum RequestCode: u8 {
        0x00 Undefined
        0x01 SetCur
        0x02 SetMin
        0x03 SetMax
        0x04 SetRes
        0x05 SetMem
        0x81 GetCur
        0x82 GetMin
        0x83 GetMax
        0x84 GetRes
        0x85 GetMem
        0xff GetStat
    }
}

usb_layout::codes! {
    /// What raised a status interrupt.
    pub enum Originator: u8 {
        0x00 ControlInterface
        0x01 StreamingInterface
        0x02 StreamingEndpoint
    }
}

usb_layout::codes! {
    /// Terminal control selectors.
    pub enum TerminalControl: u8 {
        0x00 Undefined
        0x01 CopyProtect
    }
}

usb_layout::codes! {
    /// Feature unit control selectors. Selector `n` is bit `n - 1` of a
    /// [`FeatureControls`] bitmap.
    pub enum FeatureControl: u8 {
        0x00 Undefined
        0x01 Mute
        0x02 Volume
        0x03 Bass
        0x04 Mid
        0x05 Treble
        0x06 GraphicEqualizer
        0x07 AutomaticGain
        0x08 Delay
        0x09 BassBoost
        0x0a Loudness
    }
}

usb_layout::codes! {
    pub enum UpDownMixControl: u8 {
        0x00 Undefined
        0x01 Enable
        0x02 ModeSelect
    }
}

usb_layout::codes! {
    pub enum DolbyPrologicControl: u8 {
        0x00 Undefined
        0x01 Enable
        0x02 ModeSelect
    }
}

usb_layout::codes! {
    pub enum Stereo3dControl: u8 {
        0x00 Undefined
        0x01 Enable
        0x03 Spaciousness
    }
}

usb_layout::codes! {
    pub enum ReverbControl: u8 {
        0x00 Undefined
        0x01 Enable
        0x02 Level
        0x03 Time
        0x04 Feedback
    }
}

usb_layout::codes! {
    pub enum ChorusControl: u8 {
        0x00 Undefined
        0x01 Enable
        0x02 Level
        0x03 Rate
        0x04 Depth
    }
}

usb_layout::codes! {
    /// Dynamic range compressor control selectors.
    pub enum DynRangeCompControl: u8 {
        0x00 Undefined
        0x01 Enable
        0x02 CompressionRate
        0x03 MaxAmplitude
        0x04 Threshold
        0x05 AttackTime
        0x06 ReleaseTime
    }
}

usb_layout::codes! {
    pub enum ExtensionControl: u8 {
        0x00 Undefined
        0x01 Enable
    }
}

usb_layout::codes! {
    /// Class-specific endpoint control selectors.
    pub enum EndpointControl: u8 {
        0x00 Undefined
        0x01 SamplingFrequency
        0x02 Pitch
    }
}

bitflags::bitflags! {
    /// The controls a feature unit offers on one channel, as in `bmaControls`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FeatureControls: u32 {
        const MUTE = 1 << 0;
        const VOLUME = 1 << 1;
        const BASS = 1 << 2;
        const MID = 1 << 3;
        const TREBLE = 1 << 4;
        const GRAPHIC_EQUALIZER = 1 << 5;
        const AUTOMATIC_GAIN = 1 << 6;
        const DELAY = 1 << 7;
        const BASS_BOOST = 1 << 8;
        const LOUDNESS = 1 << 9;
    }
}

flags_codec!(FeatureControls: u32);

impl FeatureControls {
    /// The bit of `selector`. Empty for `Undefined` and for selectors past bit 31.
    pub fn selector(selector: FeatureControl) -> Self {
        match selector.code() {
            n @ 1..=32 => Self::from_bits_retain(1 << (n - 1)),
            _ => Self::empty(),
        }
    }

    /// The selectors of the set bits, unknown ones included, lowest first.
    pub fn selectors(self) -> impl Iterator<Item = FeatureControl> {
        let bits = self.bits();
        (1..=32u8)
            .filter(move |&n| bits & (1 << (n - 1)) != 0)
            .map(FeatureControl::decode)
    }
}

bitflags::bitflags! {
    /// Channel positions, as in `wChannelConfig`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SpatialLocation: u16 {
        const LEFT_FRONT = 1 << 0;
        const RIGHT_FRONT = 1 << 1;
        const CENTER_FRONT = 1 << 2;
        const LOW_FREQUENCY_ENHANCEMENT = 1 << 3;
        const LEFT_SURROUND = 1 << 4;
        const RIGHT_SURROUND = 1 << 5;
        const LEFT_OF_CENTER = 1 << 6;
        const RIGHT_OF_CENTER = 1 << 7;
        const SURROUND = 1 << 8;
        const SIDE_LEFT = 1 << 9;
        const SIDE_RIGHT = 1 << 10;
        const TOP = 1 << 11;
    }
}

flags_codec!(SpatialLocation: u16);

pub(crate) const SUBTYPE: FieldSpec = FieldSpec::u8("bDescriptorSubtype", 2);

const CLASS_SPECIFIC_FIELDS: [FieldSpec; 3] = [LENGTH, DESCRIPTOR_TYPE, SUBTYPE];

/// The header shared by every class-specific descriptor.
pub const CLASS_SPECIFIC: StructSchema =
    StructSchema::checked("class-specific", 3, &CLASS_SPECIFIC_FIELDS);

/// Class-specific descriptors packed back to back, all kept opaque.
pub(crate) const CLASS_SPECIFIC_LIST: Registry<'static> = Registry::new(HEADER, &[]);

/// Decodes a class-specific descriptor, checking its type and subtype.
pub(crate) fn decode_subtype<B: AsRef<[u8]>, T: EnumCodec<Raw = u8>>(
    schema: &'static StructSchema,
    ty: CsType,
    subtype: T,
    bytes: B,
) -> Result<Struct<'static, B>, Error> {
    let view = decode_as(schema, ty, bytes)?;
    let found = view.get(&SUBTYPE) as u8;
    ensure!(
        found == subtype.code(),
        UnexpectedSubtypeSnafu {
            descriptor: schema.name(),
            expected: subtype.code(),
            found,
        }
    );
    Ok(view)
}

const STATUS_TYPE: FieldSpec = FieldSpec::u8("bStatusType", 0);
const ORIGINATOR_ID: FieldSpec = FieldSpec::u8("bOriginator", 1);
const INTERRUPT_DATA_FIELDS: [FieldSpec; 2] = [STATUS_TYPE, ORIGINATOR_ID];

pub const INTERRUPT_DATA: StructSchema =
    StructSchema::checked("status interrupt", 2, &INTERRUPT_DATA_FIELDS);

view! {
    /// The two bytes an AudioControl interrupt endpoint reports.
    pub struct InterruptData {
        status_type: u8 = STATUS_TYPE;
        pending / set_pending: bool = Bits::new(STATUS_TYPE, BitfieldSpec::bit(7));
        memory_changed / set_memory_changed: bool = Bits::new(STATUS_TYPE, BitfieldSpec::bit(6));
        originator / set_originator: Originator = Bits::new(STATUS_TYPE, BitfieldSpec::checked(0x0f));
        /// Id of the terminal, unit, interface or endpoint that raised the interrupt.
        originator_id / set_originator_id: u8 = ORIGINATOR_ID;
    }
}

impl<B: AsRef<[u8]>> InterruptData<B> {
    pub fn new(bytes: B) -> Result<Self, Error> {
        Struct::decode(&INTERRUPT_DATA, bytes)
            .context(MalformedSnafu {
                descriptor: INTERRUPT_DATA.name(),
            })
            .map(Self)
    }
}
