usb_layout::codes! {
    /// Class codes, as used in device and interface descriptors.
    pub enum ClassCode: u8 {
        /// Each interface declares its own class.
        0x00 PerInterface
        0x01 Audio
        0x02 Communications
        0x03 Hid
        0x05 Physical
        0x06 Image
        0x07 Printer
        0x08 MassStorage
        0x09 Hub
        0x0a Data
        0x0b SmartCard
        0x0d ContentSecurity
        0x0e Video
        0x0f PersonalHealthcare
        0xdc Diagnostic
        0xe0 Wireless
        0xef Miscellaneous
        0xfe Application
        0xff VendorSpecific
    }
}
