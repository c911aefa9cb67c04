use crate::field::Accessor;
use core::{fmt, marker::PhantomData, ops::Range};

/// Integer types a code can be stored as.
pub trait RawCode: Copy + Eq + Into<u64> {
    /// Keeps the low bits of `value` that fit.
    fn truncate(value: u64) -> Self;
}

macro_rules! raw_code {
    ($($t:ty)*) => {
        $(
            impl RawCode for $t {
                fn truncate(value: u64) -> Self {
                    value as $t
                }
            }
        )*
    };
}

raw_code!(u8 u16 u32 u64);

/// A total, lossless mapping between raw codes and typed values.
///
/// `decode` never fails. Codes without a name decode to a value that keeps the raw
/// code, so `code(decode(x)) == x` for every `x`.
pub trait EnumCodec: Copy {
    type Raw: RawCode;

    fn decode(raw: Self::Raw) -> Self;

    fn code(self) -> Self::Raw;
}

macro_rules! identity_codec {
    ($($t:ty)*) => {
        $(
            impl EnumCodec for $t {
                type Raw = $t;

                fn decode(raw: $t) -> Self {
                    raw
                }

                fn code(self) -> $t {
                    self
                }
            }
        )*
    };
}

identity_codec!(u8 u16 u32 u64);

impl EnumCodec for bool {
    type Raw = u8;

    fn decode(raw: u8) -> Self {
        raw != 0
    }

    fn code(self) -> u8 {
        self.into()
    }
}

/// Defines an enum of named codes plus an `Unknown` variant holding any other code,
/// and implements [`EnumCodec`] for it.
///
/// ```
/// usb_layout::codes! {
///     pub enum Transfer: u8 {
///         0 Control
///         1 Isochronous
///         2 Bulk
///         3 Interrupt
///     }
/// }
/// ```
#[macro_export]
macro_rules! codes {
    {
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $raw:ty {
            $(
                $(#[$vmeta:meta])*
                $code:literal $variant:ident
            )*
        }
    } => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )*
            /// A code without a name. Produced by decoding for unnamed codes only.
            Unknown($raw),
        }

        impl $crate::EnumCodec for $name {
            type Raw = $raw;

            fn decode(raw: $raw) -> Self {
                match raw {
                    $($code => Self::$variant,)*
                    raw => Self::Unknown(raw),
                }
            }

            fn code(self) -> $raw {
                match self {
                    $(Self::$variant => $code,)*
                    Self::Unknown(raw) => raw,
                }
            }
        }

        impl From<$raw> for $name {
            fn from(raw: $raw) -> Self {
                <Self as $crate::EnumCodec>::decode(raw)
            }
        }

        impl From<$name> for $raw {
            fn from(value: $name) -> Self {
                $crate::EnumCodec::code(value)
            }
        }
    };
}

/// Implements [`EnumCodec`] for `bitflags` types, keeping undefined bits.
#[macro_export]
macro_rules! flags_codec {
    ($($name:ty: $raw:ty),* $(,)?) => {
        $(
            impl $crate::EnumCodec for $name {
                type Raw = $raw;

                fn decode(raw: $raw) -> Self {
                    Self::from_bits_retain(raw)
                }

                fn code(self) -> $raw {
                    self.bits()
                }
            }
        )*
    };
}

/// An accessor whose integer is interpreted through an [`EnumCodec`].
pub struct Typed<A, C> {
    inner: A,
    codec: PhantomData<fn() -> C>,
}

impl<A, C> Typed<A, C> {
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            codec: PhantomData,
        }
    }

    pub const fn inner(&self) -> &A {
        &self.inner
    }
}

impl<A: Clone, C> Clone for Typed<A, C> {
    fn clone(&self) -> Self {
        Self::new(self.inner.clone())
    }
}

impl<A: Copy, C> Copy for Typed<A, C> {}

impl<A: fmt::Debug, C> fmt::Debug for Typed<A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(stringify!(Typed))
            .field(&self.inner)
            .field(&core::any::type_name::<C>())
            .finish()
    }
}

impl<A: Accessor<Value = u64>, C: EnumCodec> Accessor for Typed<A, C> {
    type Value = C;

    fn span(&self) -> Range<usize> {
        self.inner.span()
    }

    /// The inner value must fit in `C::Raw`; wider accessors lose their high bits.
    fn load(&self, bytes: &[u8]) -> C {
        let raw = self.inner.load(bytes);
        let code = C::Raw::truncate(raw);
        debug_assert_eq!(Into::<u64>::into(code), raw, "{:#x} does not fit the codec", raw);
        C::decode(code)
    }

    fn store(&self, bytes: &mut [u8], value: C) {
        self.inner.store(bytes, value.code().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bitfield::BitfieldSpec, field::FieldSpec, Bits};
    use quickcheck_macros::quickcheck;

    codes! {
        enum SyncType: u8 {
            0 None
            1 Asynchronous
            2 Adaptive
            3 Synchronous
        }
    }

    codes! {
        /// Sparse on purpose.
        enum Class: u8 {
            0x01 Audio
            0x03 Hid
            0xff Vendor
        }
    }

    bitflags::bitflags! {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        struct Speeds: u16 {
            const LOW = 1 << 0;
            const FULL = 1 << 1;
        }
    }

    flags_codec!(Speeds: u16);

    const SYNC: Typed<Bits<FieldSpec>, SyncType> = Typed::new(Bits::new(
        FieldSpec::u8("bmAttributes", 0),
        BitfieldSpec::checked(0x0c),
    ));

    #[test]
    fn named_and_unknown() {
        assert_eq!(Class::decode(0x03), Class::Hid);
        assert_eq!(Class::decode(0x42), Class::Unknown(0x42));
        assert_eq!(Class::Unknown(0x42).code(), 0x42);
        assert_eq!(u8::from(Class::Vendor), 0xff);
    }

    #[test]
    fn typed_bitfield() {
        let mut buf = [0b1001_0111];
        assert_eq!(SYNC.load(&buf), SyncType::Asynchronous);
        SYNC.store(&mut buf, SyncType::Synchronous);
        assert_eq!(buf, [0b1001_1111]);
    }

    #[test]
    fn flags_keep_unknown_bits() {
        let s = Speeds::decode(0x8003);
        assert!(s.contains(Speeds::LOW | Speeds::FULL));
        assert_eq!(s.code(), 0x8003);
    }

    #[test]
    fn named_variants_round_trip() {
        for v in [Class::Audio, Class::Hid, Class::Vendor] {
            assert_eq!(Class::decode(v.code()), v);
        }
        for v in [SyncType::None, SyncType::Asynchronous, SyncType::Adaptive, SyncType::Synchronous] {
            assert_eq!(SyncType::decode(v.code()), v);
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "does not fit")]
    fn codec_narrower_than_field() {
        let wide: Typed<FieldSpec, Class> = Typed::new(FieldSpec::u16("wClass", 0));
        wide.load(&[0x03, 0x01]);
    }

    #[quickcheck]
    fn code_decode_total(raw: u8) -> bool {
        Class::decode(raw).code() == raw && SyncType::decode(raw).code() == raw
    }

    #[quickcheck]
    fn unknown_never_holds_named_code(raw: u8) -> bool {
        match Class::decode(raw) {
            Class::Unknown(r) => !matches!(r, 0x01 | 0x03 | 0xff),
            _ => true,
        }
    }
}
