use crate::{
    Configuration, DescriptorType, Endpoint, Error, Interface, SsEndpointCompanion, LENGTH,
    STANDARD,
};
use alloc::{vec, vec::Vec};
use usb_layout::EnumCodec;

/// A full configuration, as returned for a configuration descriptor request, with
/// its descriptors nested.
///
/// Descriptors the tree does not model, such as class-specific ones, are kept as the
/// `extra` bytes of whatever precedes them.
#[derive(Clone, Debug)]
pub struct ConfigurationTree<'a> {
    pub configuration: Configuration<&'a [u8]>,
    pub extra: &'a [u8],
    pub interfaces: Vec<InterfaceGroup<'a>>,
}

/// Every alternate setting of one interface number.
#[derive(Clone, Debug)]
pub struct InterfaceGroup<'a> {
    pub number: u8,
    pub alt_settings: Vec<AltSetting<'a>>,
}

#[derive(Clone, Debug)]
pub struct AltSetting<'a> {
    pub interface: Interface<&'a [u8]>,
    pub extra: &'a [u8],
    pub endpoints: Vec<EndpointNode<'a>>,
}

#[derive(Clone, Debug)]
pub struct EndpointNode<'a> {
    pub endpoint: Endpoint<&'a [u8]>,
    /// Present on SuperSpeed configurations.
    pub companion: Option<SsEndpointCompanion<&'a [u8]>>,
    pub extra: &'a [u8],
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Level {
    Configuration,
    Interface,
    Endpoint,
}

struct Builder<'a> {
    extra: &'a [u8],
    alt_settings: Vec<AltSetting<'a>>,
    level: Level,
}

impl<'a> Builder<'a> {
    /// Hands a run of unmodelled descriptors to the last modelled one.
    fn attach(&mut self, extra: &'a [u8]) {
        let slot = match self.level {
            Level::Configuration => Some(&mut self.extra),
            Level::Interface => self.alt_settings.last_mut().map(|a| &mut a.extra),
            Level::Endpoint => self.open_endpoint().map(|e| &mut e.extra),
        };
        if let Some(slot) = slot {
            *slot = extra;
        }
    }

    fn open_endpoint(&mut self) -> Option<&mut EndpointNode<'a>> {
        if self.level != Level::Endpoint {
            return None;
        }
        self.alt_settings.last_mut()?.endpoints.last_mut()
    }
}

impl<'a> ConfigurationTree<'a> {
    /// Nests the descriptors of `buf`, which starts with the configuration descriptor.
    ///
    /// Only the first `wTotalLength` bytes are read. A corrupt descriptor length, or a
    /// descriptor too short for its type, fails the whole parse.
    pub fn parse(buf: &'a [u8]) -> Result<Self, Error> {
        let configuration = Configuration::new(buf)?;
        let start = configuration.view().get(&LENGTH) as usize;
        let total = usize::from(configuration.total_length());
        if total != buf.len() {
            warn!(
                "configuration wTotalLength is {}, buffer holds {} bytes",
                total,
                buf.len()
            );
        }
        let body = &buf[start..total.clamp(start, buf.len())];

        let mut tree = Builder {
            extra: &[],
            alt_settings: Vec::new(),
            level: Level::Configuration,
        };
        let mut scanner = STANDARD.scan(body);
        // Start of the current run of unmodelled descriptors.
        let mut run = 0;
        while let Some(block) = scanner.next() {
            let block = block.map_err(Error::scan)?;
            let bytes = block.as_bytes();
            let at = scanner.offset() - bytes.len();
            match DescriptorType::decode(block.discriminant() as u8) {
                DescriptorType::Interface => {
                    let interface = Interface::new(bytes)?;
                    tree.attach(&body[run..at]);
                    tree.alt_settings.push(AltSetting {
                        interface,
                        extra: &[],
                        endpoints: Vec::new(),
                    });
                    tree.level = Level::Interface;
                }
                DescriptorType::Endpoint if tree.alt_settings.is_empty() => {
                    warn!("endpoint at offset {} precedes every interface", start + at);
                    continue;
                }
                DescriptorType::Endpoint => {
                    let endpoint = Endpoint::new(bytes)?;
                    tree.attach(&body[run..at]);
                    if let Some(alt) = tree.alt_settings.last_mut() {
                        alt.endpoints.push(EndpointNode {
                            endpoint,
                            companion: None,
                            extra: &[],
                        });
                    }
                    tree.level = Level::Endpoint;
                }
                DescriptorType::SsEndpointCompanion if run == at => {
                    let companion = SsEndpointCompanion::new(bytes)?;
                    match tree.open_endpoint() {
                        Some(e) if e.companion.is_none() => e.companion = Some(companion),
                        _ => continue,
                    }
                }
                _ => continue,
            }
            run = scanner.offset();
        }
        tree.attach(&body[run..]);

        let mut interfaces: Vec<InterfaceGroup<'a>> = Vec::new();
        for alt in tree.alt_settings {
            let found = usize::from(alt.interface.num_endpoints());
            if alt.endpoints.len() != found {
                warn!(
                    "interface {} alternate setting {} declares {} endpoints, found {}",
                    alt.interface.number(),
                    alt.interface.alternate_setting(),
                    found,
                    alt.endpoints.len()
                );
            }
            let number = alt.interface.number();
            match interfaces.iter_mut().find(|g| g.number == number) {
                Some(group) => group.alt_settings.push(alt),
                None => interfaces.push(InterfaceGroup {
                    number,
                    alt_settings: vec![alt],
                }),
            }
        }
        if interfaces.len() != usize::from(configuration.num_interfaces()) {
            warn!(
                "configuration declares {} interfaces, found {}",
                configuration.num_interfaces(),
                interfaces.len()
            );
        }

        Ok(Self {
            configuration,
            extra: tree.extra,
            interfaces,
        })
    }

    pub fn interface(&self, number: u8) -> Option<&InterfaceGroup<'a>> {
        self.interfaces.iter().find(|g| g.number == number)
    }
}

impl<'a> InterfaceGroup<'a> {
    pub fn alt_setting(&self, setting: u8) -> Option<&AltSetting<'a>> {
        self.alt_settings
            .iter()
            .find(|a| a.interface.alternate_setting() == setting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::KEYBOARD, Direction, EndpointTransfer};
    use usb_layout::DecodeError;

    const MASS_STORAGE: [u8; 53] = [
        0x09, 0x02, 0x35, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32, // configuration
        0x09, 0x04, 0x00, 0x00, 0x02, 0x08, 0x06, 0x50, 0x00, // interface 0.0
        0x07, 0x05, 0x81, 0x02, 0x00, 0x04, 0x00, // bulk in
        0x06, 0x30, 0x0f, 0x00, 0x00, 0x00, // companion
        0x07, 0x05, 0x02, 0x02, 0x00, 0x04, 0x00, // bulk out
        0x06, 0x30, 0x0f, 0x00, 0x00, 0x00, // companion
        0x09, 0x04, 0x00, 0x01, 0x00, 0x08, 0x06, 0x62, 0x00, // interface 0.1
    ];

    #[test]
    fn keyboard() {
        let tree = ConfigurationTree::parse(KEYBOARD).unwrap();
        assert_eq!(tree.configuration.total_length(), 34);
        assert!(tree.extra.is_empty());
        assert_eq!(tree.interfaces.len(), 1);
        let alt = &tree.interface(0).unwrap().alt_settings[0];
        assert_eq!(alt.extra, &KEYBOARD[18..27]);
        assert_eq!(alt.endpoints.len(), 1);
        let e = &alt.endpoints[0];
        assert_eq!(e.endpoint.direction(), Direction::In);
        assert!(e.companion.is_none());
        assert!(e.extra.is_empty());
    }

    #[test]
    fn superspeed_alt_settings() {
        let tree = ConfigurationTree::parse(&MASS_STORAGE).unwrap();
        assert_eq!(tree.interfaces.len(), 1);
        let group = &tree.interfaces[0];
        assert_eq!(group.alt_settings.len(), 2);
        let bulk = group.alt_setting(0).unwrap();
        assert_eq!(bulk.endpoints.len(), 2);
        for e in &bulk.endpoints {
            assert_eq!(e.endpoint.transfer(), EndpointTransfer::Bulk);
            assert_eq!(e.companion.map(|c| c.max_burst()), Some(15));
            assert!(e.extra.is_empty());
        }
        assert_eq!(group.alt_setting(1).unwrap().interface.protocol(), 0x62);
        assert!(group.alt_setting(1).unwrap().endpoints.is_empty());
        assert!(group.alt_setting(2).is_none());
    }

    #[test]
    fn total_length_bounds_the_walk() {
        let mut buf = MASS_STORAGE.to_vec();
        buf.extend_from_slice(&[0x04, 0x24, 0x01, 0x00]);
        let tree = ConfigurationTree::parse(&buf).unwrap();
        assert!(tree.interfaces[0].alt_settings[1].extra.is_empty());

        buf[2] = 0x39;
        let tree = ConfigurationTree::parse(&buf).unwrap();
        assert_eq!(tree.interfaces[0].alt_settings[1].extra, [0x04, 0x24, 0x01, 0x00]);
    }

    #[test]
    fn late_companion_is_extra() {
        let buf = [
            0x09, 0x02, 0x21, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32, //
            0x09, 0x04, 0x00, 0x00, 0x01, 0xff, 0x00, 0x00, 0x00, //
            0x07, 0x05, 0x81, 0x02, 0x00, 0x04, 0x00, //
            0x02, 0x25, //
            0x06, 0x30, 0x00, 0x00, 0x00, 0x00,
        ];
        let tree = ConfigurationTree::parse(&buf).unwrap();
        let e = &tree.interfaces[0].alt_settings[0].endpoints[0];
        assert!(e.companion.is_none());
        assert_eq!(e.extra, &buf[25..]);
    }

    #[test]
    fn corrupt_length() {
        let mut buf = KEYBOARD.to_vec();
        buf[27] = 8;
        assert!(matches!(
            ConfigurationTree::parse(&buf),
            Err(Error::Corrupt {
                source: DecodeError::CorruptCollection { offset: 18, length: 8, total: 25 }
            })
        ));
    }

    #[test]
    fn not_a_configuration() {
        assert!(matches!(
            ConfigurationTree::parse(&crate::tests::DEVICE_DUMP),
            Err(Error::UnexpectedType { expected: 0x02, found: 0x01, .. })
        ));
    }
}
