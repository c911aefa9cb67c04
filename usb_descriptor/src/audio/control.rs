use super::{
    decode_subtype, ControlSubtype, CsType, FeatureControls, ProcessType, SpatialLocation, TerminalType,
    CLASS_SPECIFIC, CLASS_SPECIFIC_LIST, SUBTYPE,
};
use crate::{decode_as, error::MalformedSnafu, Error, DESCRIPTOR_TYPE, LENGTH};
use snafu::ResultExt;
use usb_layout::{Array, Cursor, Element, EnumCodec, FieldSpec, Struct, StructSchema, Width};

const BYTES: Element = Element::scalar(Width::U8);

const NR_CHANNELS: FieldSpec = FieldSpec::u8("bNrChannels", 0);
const CHANNEL_CONFIG: FieldSpec = FieldSpec::u16("wChannelConfig", 1);
const CHANNEL_NAMES: FieldSpec = FieldSpec::u8("iChannelNames", 3);
const CLUSTER_FIELDS: [FieldSpec; 3] = [NR_CHANNELS, CHANNEL_CONFIG, CHANNEL_NAMES];

/// The logical channels leaving a terminal or unit.
pub const CLUSTER: StructSchema = StructSchema::checked("channel cluster", 4, &CLUSTER_FIELDS);

view! {
    pub struct Cluster {
        nr_channels: u8 = NR_CHANNELS;
        /// Positions of the predefined channels. Further channels are unpositioned.
        channel_config: SpatialLocation = CHANNEL_CONFIG;
        /// String index of the first unpositioned channel's name.
        channel_names: u8 = CHANNEL_NAMES;
    }
}

const TERMINAL_ID: FieldSpec = FieldSpec::u8("bTerminalID", 3);
const TERMINAL_TYPE: FieldSpec = FieldSpec::u16("wTerminalType", 4);
const ASSOC_TERMINAL: FieldSpec = FieldSpec::u8("bAssocTerminal", 6);

const INPUT_CLUSTER: FieldSpec = FieldSpec::nested("cluster", 7, &CLUSTER);
const INPUT_INDEX: FieldSpec = FieldSpec::u8("iTerminal", 11);
const INPUT_TERMINAL_FIELDS: [FieldSpec; 8] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    SUBTYPE,
    TERMINAL_ID,
    TERMINAL_TYPE,
    ASSOC_TERMINAL,
    INPUT_CLUSTER,
    INPUT_INDEX,
];
pub const INPUT_TERMINAL: StructSchema =
    StructSchema::checked("input terminal", 12, &INPUT_TERMINAL_FIELDS);

view! {
    pub struct InputTerminal {
        terminal_id: u8 = TERMINAL_ID;
        terminal_type: TerminalType = TERMINAL_TYPE;
        /// The output terminal this one is paired with, or zero.
        assoc_terminal: u8 = ASSOC_TERMINAL;
        index: u8 = INPUT_INDEX;
    }
}

impl<B: AsRef<[u8]>> InputTerminal<B> {
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_subtype(
            &INPUT_TERMINAL,
            CsType::Interface,
            ControlSubtype::InputTerminal,
            bytes,
        )
        .map(Self)
    }

    pub fn cluster(&self) -> Cluster<&[u8]> {
        Cluster(self.0.nested(&INPUT_CLUSTER))
    }
}

const SOURCE_ID: FieldSpec = FieldSpec::u8("bSourceID", 7);
const OUTPUT_INDEX: FieldSpec = FieldSpec::u8("iTerminal", 8);
const OUTPUT_TERMINAL_FIELDS: [FieldSpec; 8] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    SUBTYPE,
    TERMINAL_ID,
    TERMINAL_TYPE,
    ASSOC_TERMINAL,
    SOURCE_ID,
    OUTPUT_INDEX,
];
pub const OUTPUT_TERMINAL: StructSchema =
    StructSchema::checked("output terminal", 9, &OUTPUT_TERMINAL_FIELDS);

view! {
    pub struct OutputTerminal {
        terminal_id: u8 = TERMINAL_ID;
        terminal_type: TerminalType = TERMINAL_TYPE;
        assoc_terminal: u8 = ASSOC_TERMINAL;
        /// The unit or terminal feeding this one.
        source_id: u8 = SOURCE_ID;
        index: u8 = OUTPUT_INDEX;
    }
}

impl<B: AsRef<[u8]>> OutputTerminal<B> {
    pub fn new(bytes: B) -> Result<Self, Error> {
        decode_subtype(
            &OUTPUT_TERMINAL,
            CsType::Interface,
            ControlSubtype::OutputTerminal,
            bytes,
        )
        .map(Self)
    }
}

/// Checks type and subtype, then stages the descriptor's `bLength` bytes after the
/// fixed prefix.
fn staged<'a>(
    schema: &'static StructSchema,
    subtype: ControlSubtype,
    bytes: &'a [u8],
) -> Result<(Struct<'static, &'a [u8]>, Cursor<'a>), Error> {
    let view = decode_subtype(schema, CsType::Interface, subtype, bytes)?;
    let mut cursor = Cursor::new(&bytes[..view.get(&LENGTH) as usize]);
    let prefix = cursor.fixed(schema).context(MalformedSnafu {
        descriptor: schema.name(),
    })?;
    Ok((prefix, cursor))
}

fn ids<'a>(array: &Array<'a>) -> impl Iterator<Item = u8> + 'a {
    array.values().map(|v| v as u8)
}

const ADC: FieldSpec = FieldSpec::u16("bcdADC", 3);
const TOTAL_LENGTH: FieldSpec = FieldSpec::u16("wTotalLength", 5);
const IN_COLLECTION: FieldSpec = FieldSpec::u8("bInCollection", 7);
const CONTROL_HEADER_FIELDS: [FieldSpec; 6] =
    [LENGTH, DESCRIPTOR_TYPE, SUBTYPE, ADC, TOTAL_LENGTH, IN_COLLECTION];

pub const CONTROL_HEADER: StructSchema =
    StructSchema::checked("AudioControl header", 8, &CONTROL_HEADER_FIELDS);

#[derive(Clone, Copy, Debug)]
pub struct Header<'a> {
    view: Struct<'static, &'a [u8]>,
    interfaces: Array<'a>,
}

impl<'a> Header<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let (view, mut c) = staged(&CONTROL_HEADER, ControlSubtype::Header, bytes)?;
        let n = view.get(&IN_COLLECTION) as usize;
        let interfaces = c
            .array("baInterfaceNr", n, BYTES)
            .context(MalformedSnafu {
                descriptor: CONTROL_HEADER.name(),
            })?;
        Ok(Self { view, interfaces })
    }

    /// Audio class release, in binary-coded decimal.
    pub fn adc(&self) -> u16 {
        self.view.get(&ADC) as u16
    }

    /// Length of the header and every unit and terminal descriptor after it.
    pub fn total_length(&self) -> u16 {
        self.view.get(&TOTAL_LENGTH) as u16
    }

    /// The AudioStreaming and MIDIStreaming interfaces of this function.
    pub fn interfaces(&self) -> impl Iterator<Item = u8> + 'a {
        ids(&self.interfaces)
    }
}

const UNIT_ID: FieldSpec = FieldSpec::u8("bUnitID", 3);
const NR_IN_PINS: FieldSpec = FieldSpec::u8("bNrInPins", 4);
const UNIT_FIELDS: [FieldSpec; 5] = [LENGTH, DESCRIPTOR_TYPE, SUBTYPE, UNIT_ID, NR_IN_PINS];

pub const MIXER_UNIT: StructSchema = StructSchema::checked("mixer unit", 5, &UNIT_FIELDS);
pub const SELECTOR_UNIT: StructSchema = StructSchema::checked("selector unit", 5, &UNIT_FIELDS);

#[derive(Clone, Copy, Debug)]
pub struct MixerUnit<'a> {
    view: Struct<'static, &'a [u8]>,
    sources: Array<'a>,
    cluster: Cluster<&'a [u8]>,
    controls: &'a [u8],
    index: u8,
}

impl<'a> MixerUnit<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let (view, mut c) = staged(&MIXER_UNIT, ControlSubtype::Mixer, bytes)?;
        let malformed = MalformedSnafu {
            descriptor: MIXER_UNIT.name(),
        };
        let p = view.get(&NR_IN_PINS) as usize;
        let sources = c.array("baSourceID", p, BYTES).context(malformed)?;
        let cluster = Cluster(c.fixed(&CLUSTER).context(malformed)?);
        // Whatever the other fields leave is the control bitmap.
        let n = (view.get(&LENGTH) as usize).saturating_sub(10 + p);
        let controls = c.take("bmControls", n).context(malformed)?;
        let index = c.u8("iMixer").context(malformed)?;
        Ok(Self {
            view,
            sources,
            cluster,
            controls,
            index,
        })
    }

    pub fn unit_id(&self) -> u8 {
        self.view.get(&UNIT_ID) as u8
    }

    pub fn sources(&self) -> impl Iterator<Item = u8> + 'a {
        ids(&self.sources)
    }

    pub fn cluster(&self) -> Cluster<&'a [u8]> {
        self.cluster
    }

    /// Which input channel to output channel crossings are programmable, one bit each.
    pub fn controls(&self) -> &'a [u8] {
        self.controls
    }

    pub fn index(&self) -> u8 {
        self.index
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SelectorUnit<'a> {
    view: Struct<'static, &'a [u8]>,
    sources: Array<'a>,
    index: u8,
}

impl<'a> SelectorUnit<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let (view, mut c) = staged(&SELECTOR_UNIT, ControlSubtype::Selector, bytes)?;
        let malformed = MalformedSnafu {
            descriptor: SELECTOR_UNIT.name(),
        };
        let p = view.get(&NR_IN_PINS) as usize;
        let sources = c.array("baSourceID", p, BYTES).context(malformed)?;
        let index = c.u8("iSelector").context(malformed)?;
        Ok(Self {
            view,
            sources,
            index,
        })
    }

    pub fn unit_id(&self) -> u8 {
        self.view.get(&UNIT_ID) as u8
    }

    pub fn sources(&self) -> impl Iterator<Item = u8> + 'a {
        ids(&self.sources)
    }

    pub fn index(&self) -> u8 {
        self.index
    }
}

const FEATURE_SOURCE_ID: FieldSpec = FieldSpec::u8("bSourceID", 4);
const CONTROL_SIZE: FieldSpec = FieldSpec::u8("bControlSize", 5);
const FEATURE_FIELDS: [FieldSpec; 6] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    SUBTYPE,
    UNIT_ID,
    FEATURE_SOURCE_ID,
    CONTROL_SIZE,
];

pub const FEATURE_UNIT: StructSchema = StructSchema::checked("feature unit", 6, &FEATURE_FIELDS);

#[derive(Clone, Copy, Debug)]
pub struct FeatureUnit<'a> {
    view: Struct<'static, &'a [u8]>,
    controls: &'a [u8],
    index: u8,
}

impl<'a> FeatureUnit<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let (view, mut c) = staged(&FEATURE_UNIT, ControlSubtype::Feature, bytes)?;
        let malformed = MalformedSnafu {
            descriptor: FEATURE_UNIT.name(),
        };
        let size = view.get(&CONTROL_SIZE) as usize;
        let channels = match size {
            0 => 0,
            n => ((view.get(&LENGTH) as usize).saturating_sub(7) / n).saturating_sub(1),
        };
        let controls = c.take("bmaControls", (channels + 1) * size).context(malformed)?;
        let index = c.u8("iFeature").context(malformed)?;
        Ok(Self {
            view,
            controls,
            index,
        })
    }

    pub fn unit_id(&self) -> u8 {
        self.view.get(&UNIT_ID) as u8
    }

    pub fn source_id(&self) -> u8 {
        self.view.get(&FEATURE_SOURCE_ID) as u8
    }

    pub fn control_size(&self) -> usize {
        self.view.get(&CONTROL_SIZE) as usize
    }

    /// Logical channels with their own controls, not counting the master channel.
    pub fn channels(&self) -> usize {
        match self.control_size() {
            0 => 0,
            n => self.controls.len() / n - 1,
        }
    }

    /// Control bitmaps, master channel first.
    pub fn controls(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.controls.chunks_exact(self.control_size().max(1))
    }

    /// The controls of `channel`, zero being the master channel. Bitmap bytes past
    /// the fourth are ignored.
    pub fn channel_controls(&self, channel: usize) -> Option<FeatureControls> {
        let bitmap = self.controls().nth(channel)?;
        let bits = bitmap.iter().take(4).rev().fold(0, |v, &b| v << 8 | u32::from(b));
        Some(FeatureControls::decode(bits))
    }

    pub fn index(&self) -> u8 {
        self.index
    }
}

const PROCESS_TYPE: FieldSpec = FieldSpec::u16("wProcessType", 4);
const EXTENSION_CODE: FieldSpec = FieldSpec::u16("wExtensionCode", 4);
const PROCESSING_IN_PINS: FieldSpec = FieldSpec::u8("bNrInPins", 6);
const PROCESSING_FIELDS: [FieldSpec; 6] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    SUBTYPE,
    UNIT_ID,
    PROCESS_TYPE,
    PROCESSING_IN_PINS,
];
const EXTENSION_FIELDS: [FieldSpec; 6] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    SUBTYPE,
    UNIT_ID,
    EXTENSION_CODE,
    PROCESSING_IN_PINS,
];

pub const PROCESSING_UNIT: StructSchema =
    StructSchema::checked("processing unit", 7, &PROCESSING_FIELDS);
pub const EXTENSION_UNIT: StructSchema =
    StructSchema::checked("extension unit", 7, &EXTENSION_FIELDS);

/// The layout shared by processing and extension units after their fixed prefix.
#[derive(Clone, Copy, Debug)]
struct Unit<'a> {
    sources: Array<'a>,
    cluster: Cluster<&'a [u8]>,
    controls: &'a [u8],
    index: u8,
}

impl<'a> Unit<'a> {
    fn stage(
        view: &Struct<'static, &'a [u8]>,
        c: &mut Cursor<'a>,
        index: &'static str,
    ) -> Result<Self, Error> {
        let malformed = MalformedSnafu {
            descriptor: view.schema().name(),
        };
        let p = view.get(&PROCESSING_IN_PINS) as usize;
        let sources = c.array("baSourceID", p, BYTES).context(malformed)?;
        let cluster = Cluster(c.fixed(&CLUSTER).context(malformed)?);
        let n = c.u8("bControlSize").context(malformed)?;
        let controls = c.take("bmControls", n.into()).context(malformed)?;
        let index = c.u8(index).context(malformed)?;
        Ok(Self {
            sources,
            cluster,
            controls,
            index,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ProcessingUnit<'a> {
    view: Struct<'static, &'a [u8]>,
    unit: Unit<'a>,
    extra: &'a [u8],
    modes: Option<Array<'a>>,
}

impl<'a> ProcessingUnit<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let (view, mut c) = staged(&PROCESSING_UNIT, ControlSubtype::Processing, bytes)?;
        let unit = Unit::stage(&view, &mut c, "iProcessing")?;
        let extra = c.rest();
        let modes = match ProcessType::decode(view.get(&PROCESS_TYPE) as u16) {
            ProcessType::UpDownMix | ProcessType::DolbyPrologic => {
                let mut c = Cursor::new(extra);
                let malformed = MalformedSnafu {
                    descriptor: PROCESSING_UNIT.name(),
                };
                let m = c.u8("bNrModes").context(malformed)?;
                Some(
                    c.array("waModes", m.into(), Element::scalar(Width::U16))
                        .context(malformed)?,
                )
            }
            _ => None,
        };
        Ok(Self {
            view,
            unit,
            extra,
            modes,
        })
    }

    pub fn unit_id(&self) -> u8 {
        self.view.get(&UNIT_ID) as u8
    }

    pub fn process_type(&self) -> ProcessType {
        ProcessType::decode(self.view.get(&PROCESS_TYPE) as u16)
    }

    pub fn sources(&self) -> impl Iterator<Item = u8> + 'a {
        ids(&self.unit.sources)
    }

    pub fn cluster(&self) -> Cluster<&'a [u8]> {
        self.unit.cluster
    }

    pub fn controls(&self) -> &'a [u8] {
        self.unit.controls
    }

    pub fn index(&self) -> u8 {
        self.unit.index
    }

    /// Process-specific bytes after the string index.
    pub fn extra(&self) -> &'a [u8] {
        self.extra
    }

    /// The channel layouts an up/down-mix or Dolby ProLogic unit can produce.
    pub fn modes(&self) -> Option<impl Iterator<Item = SpatialLocation> + 'a> {
        let modes = self.modes?;
        Some(modes.values().map(|v| SpatialLocation::decode(v as u16)))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ExtensionUnit<'a> {
    view: Struct<'static, &'a [u8]>,
    unit: Unit<'a>,
}

impl<'a> ExtensionUnit<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let (view, mut c) = staged(&EXTENSION_UNIT, ControlSubtype::Extension, bytes)?;
        let unit = Unit::stage(&view, &mut c, "iExtension")?;
        Ok(Self { view, unit })
    }

    pub fn unit_id(&self) -> u8 {
        self.view.get(&UNIT_ID) as u8
    }

    /// Vendor specific code identifying the extension.
    pub fn extension_code(&self) -> u16 {
        self.view.get(&EXTENSION_CODE) as u16
    }

    pub fn sources(&self) -> impl Iterator<Item = u8> + 'a {
        ids(&self.unit.sources)
    }

    pub fn cluster(&self) -> Cluster<&'a [u8]> {
        self.unit.cluster
    }

    pub fn controls(&self) -> &'a [u8] {
        self.unit.controls
    }

    pub fn index(&self) -> u8 {
        self.unit.index
    }
}

const INTERFACE_NR: FieldSpec = FieldSpec::u8("bInterfaceNr", 3);
const ASSOC_INTERFACE_FIELDS: [FieldSpec; 4] = [LENGTH, DESCRIPTOR_TYPE, SUBTYPE, INTERFACE_NR];

pub const ASSOC_INTERFACE: StructSchema =
    StructSchema::checked("associated interface", 4, &ASSOC_INTERFACE_FIELDS);

#[derive(Clone, Copy, Debug)]
pub struct AssocInterface<'a> {
    view: Struct<'static, &'a [u8]>,
    extra: &'a [u8],
}

impl<'a> AssocInterface<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let (view, mut c) = staged(&ASSOC_INTERFACE, ControlSubtype::AssocInterface, bytes)?;
        Ok(Self {
            view,
            extra: c.rest(),
        })
    }

    pub fn interface_number(&self) -> u8 {
        self.view.get(&INTERFACE_NR) as u8
    }

    pub fn extra(&self) -> &'a [u8] {
        self.extra
    }
}

/// A class-specific AudioControl interface descriptor.
#[derive(Clone, Copy, Debug)]
pub enum AudioControl<'a> {
    Header(Header<'a>),
    InputTerminal(InputTerminal<&'a [u8]>),
    OutputTerminal(OutputTerminal<&'a [u8]>),
    Mixer(MixerUnit<'a>),
    Selector(SelectorUnit<'a>),
    Feature(FeatureUnit<'a>),
    Processing(ProcessingUnit<'a>),
    Extension(ExtensionUnit<'a>),
    AssocInterface(AssocInterface<'a>),
    /// A subtype without a decoder. `data` is the whole descriptor.
    Opaque {
        subtype: ControlSubtype,
        data: &'a [u8],
    },
}

impl<'a> AudioControl<'a> {
    /// Decodes the descriptor at the start of `bytes` by its subtype.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let header = decode_as(&CLASS_SPECIFIC, CsType::Interface, bytes)?;
        let length = header.get(&LENGTH) as usize;
        Ok(match ControlSubtype::decode(header.get(&SUBTYPE) as u8) {
            ControlSubtype::Header => Self::Header(Header::parse(bytes)?),
            ControlSubtype::InputTerminal => {
                Self::InputTerminal(InputTerminal::new(&bytes[..length])?)
            }
            ControlSubtype::OutputTerminal => {
                Self::OutputTerminal(OutputTerminal::new(&bytes[..length])?)
            }
            ControlSubtype::Mixer => Self::Mixer(MixerUnit::parse(bytes)?),
            ControlSubtype::Selector => Self::Selector(SelectorUnit::parse(bytes)?),
            ControlSubtype::Feature => Self::Feature(FeatureUnit::parse(bytes)?),
            ControlSubtype::Processing => Self::Processing(ProcessingUnit::parse(bytes)?),
            ControlSubtype::Extension => Self::Extension(ExtensionUnit::parse(bytes)?),
            ControlSubtype::AssocInterface => {
                Self::AssocInterface(AssocInterface::parse(bytes)?)
            }
            subtype => {
                debug!("no decoder for AudioControl subtype {:?}", subtype);
                Self::Opaque {
                    subtype,
                    data: &bytes[..length],
                }
            }
        })
    }

    /// Decodes every class-specific descriptor in `extra`, as found after an
    /// AudioControl interface in a configuration tree.
    pub fn parse_all(extra: &'a [u8]) -> impl Iterator<Item = Result<Self, Error>> + 'a {
        CLASS_SPECIFIC_LIST
            .scan(extra)
            .map(|r| r.map_err(Error::scan).and_then(|b| Self::parse(b.as_bytes())))
    }
}
