use crate::{decode_as, DescriptorType, Error, DESCRIPTOR_TYPE, LENGTH};
use usb_layout::{BitfieldSpec, Bits, FieldSpec, StructSchema, Typed};

const ADDRESS: FieldSpec = FieldSpec::u8("bEndpointAddress", 2);
const ATTRIBUTES: FieldSpec = FieldSpec::u8("bmAttributes", 3);
const MAX_PACKET_SIZE: FieldSpec = FieldSpec::u16("wMaxPacketSize", 4);
const INTERVAL: FieldSpec = FieldSpec::u8("bInterval", 6);
const REFRESH: FieldSpec = FieldSpec::u8("bRefresh", 7);
const SYNCH_ADDRESS: FieldSpec = FieldSpec::u8("bSynchAddress", 8);

const NUMBER: Bits<FieldSpec> = Bits::new(ADDRESS, BitfieldSpec::checked(0x0f));
const DIRECTION: Bits<FieldSpec> = Bits::new(ADDRESS, BitfieldSpec::bit(7));
const TRANSFER: Bits<FieldSpec> = Bits::new(ATTRIBUTES, BitfieldSpec::checked(0x03));
const SYNC: Bits<FieldSpec> = Bits::new(ATTRIBUTES, BitfieldSpec::checked(0x0c));
const USAGE: Bits<FieldSpec> = Bits::new(ATTRIBUTES, BitfieldSpec::checked(0x30));
const PACKET_SIZE: Bits<FieldSpec> = Bits::new(MAX_PACKET_SIZE, BitfieldSpec::checked(0x07ff));
const TRANSACTIONS: Bits<FieldSpec> = Bits::new(MAX_PACKET_SIZE, BitfieldSpec::checked(0x1800));

const FIELDS: [FieldSpec; 6] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    ADDRESS,
    ATTRIBUTES,
    MAX_PACKET_SIZE,
    INTERVAL,
];
const AUDIO_FIELDS: [FieldSpec; 8] = [
    LENGTH,
    DESCRIPTOR_TYPE,
    ADDRESS,
    ATTRIBUTES,
    MAX_PACKET_SIZE,
    INTERVAL,
    REFRESH,
    SYNCH_ADDRESS,
];

pub const ENDPOINT: StructSchema = StructSchema::checked("endpoint", 7, &FIELDS);
/// The audio class form, with two extra fields for synchronisation endpoints.
pub const AUDIO_ENDPOINT: StructSchema = StructSchema::checked("audio endpoint", 9, &AUDIO_FIELDS);

usb_layout::codes! {
    pub enum Direction: u8 {
        0 Out
        1 In
    }
}

usb_layout::codes! {
    pub enum EndpointTransfer: u8 {
        0 Control
        1 Isoch
        2 Bulk
        3 Interrupt
    }
}

usb_layout::codes! {
    /// Synchronisation type of isochronous endpoints.
    pub enum EndpointSync: u8 {
        0 None
        1 Async
        2 Adapt
        3 Sync
    }
}

usb_layout::codes! {
    /// Usage type of isochronous endpoints. Code 3 is reserved.
    pub enum EndpointUsage: u8 {
        0 Data
        1 Feedback
        2 Implicit
    }
}

view! {
    pub struct Endpoint {
        /// The address of the endpoint on the USB device described by this descriptor.
        address / set_address: u8 = ADDRESS;
        number / set_number: u8 = NUMBER;
        direction / set_direction: Direction = DIRECTION;
        transfer / set_transfer: EndpointTransfer = TRANSFER;
        sync / set_sync: EndpointSync = SYNC;
        usage / set_usage: EndpointUsage = USAGE;
        max_packet_size / set_max_packet_size: u16 = PACKET_SIZE;
        /// Additional transactions per microframe for high-speed periodic endpoints.
        transactions: u8 = TRANSACTIONS;
        interval: u8 = INTERVAL;
    }
}

impl<B: AsRef<[u8]>> Endpoint<B> {
    /// Decodes the audio form when `bLength` allows it.
    pub fn new(bytes: B) -> Result<Self, Error> {
        let audio = bytes
            .as_ref()
            .first()
            .map_or(false, |&l| usize::from(l) >= AUDIO_ENDPOINT.size());
        let schema = if audio { &AUDIO_ENDPOINT } else { &ENDPOINT };
        decode_as(schema, DescriptorType::Endpoint, bytes).map(Self)
    }

    pub fn refresh(&self) -> Option<u8> {
        self.audio_field(REFRESH)
    }

    pub fn synch_address(&self) -> Option<u8> {
        self.audio_field(SYNCH_ADDRESS)
    }

    fn audio_field(&self, field: FieldSpec) -> Option<u8> {
        (self.0.schema().size() >= AUDIO_ENDPOINT.size())
            .then(|| self.0.get(&Typed::<_, u8>::new(field)))
    }
}
