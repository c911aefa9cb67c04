use snafu::Snafu;
use usb_layout::DecodeError;

#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("malformed {descriptor} descriptor: {source}"))]
    Malformed {
        descriptor: &'static str,
        source: DecodeError,
    },
    #[snafu(display("expected {descriptor} descriptor ({expected:#04x}), found type {found:#04x}"))]
    UnexpectedType {
        descriptor: &'static str,
        expected: u8,
        found: u8,
    },
    #[snafu(display("expected {descriptor} descriptor (subtype {expected:#04x}), found subtype {found:#04x}"))]
    UnexpectedSubtype {
        descriptor: &'static str,
        expected: u8,
        found: u8,
    },
    #[snafu(display("corrupt descriptor list: {source}"))]
    Corrupt { source: DecodeError },
}

impl Error {
    /// Attributes a scan failure to the descriptor it was decoding, if any.
    pub(crate) fn scan(source: DecodeError) -> Self {
        match source {
            DecodeError::TruncatedBuffer { schema, .. } => Self::Malformed {
                descriptor: schema,
                source,
            },
            source => Self::Corrupt { source },
        }
    }
}
