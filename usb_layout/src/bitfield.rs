use crate::{error::SpecError, field::Accessor};
use core::ops::Range;

/// A contiguous or scattered set of bits within an integer.
///
/// Values are shifted down by the mask's trailing zeros on read and back up on
/// write. Writes never touch bits outside the mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitfieldSpec {
    mask: u64,
    shift: u32,
}

impl BitfieldSpec {
    pub const fn new(mask: u64) -> Result<Self, SpecError> {
        if mask == 0 {
            return Err(SpecError::ZeroMask);
        }
        Ok(Self {
            mask,
            shift: mask.trailing_zeros(),
        })
    }

    /// Like [`new`](Self::new), panicking on a zero mask. In a `const` item that
    /// panic is a compile error.
    pub const fn checked(mask: u64) -> Self {
        match Self::new(mask) {
            Ok(spec) => spec,
            Err(e) => panic!("{}", e.as_str()),
        }
    }

    /// `count` bits starting at bit `shift`, clipped to 64 bits.
    pub const fn bits(shift: u32, count: u32) -> Result<Self, SpecError> {
        if count == 0 || shift >= 64 {
            return Err(SpecError::ZeroMask);
        }
        let count = if count > 64 - shift { 64 - shift } else { count };
        Self::new(u64::MAX >> (64 - count) << shift)
    }

    /// A single bit.
    pub const fn bit(n: u32) -> Self {
        Self::checked(1 << n)
    }

    pub const fn mask(self) -> u64 {
        self.mask
    }

    pub const fn shift(self) -> u32 {
        self.shift
    }

    pub const fn extract(self, raw: u64) -> u64 {
        (raw & self.mask) >> self.shift
    }

    pub const fn insert(self, raw: u64, value: u64) -> u64 {
        (raw & !self.mask) | ((value << self.shift) & self.mask)
    }

    /// The bits `inner` selects from the value this spec extracts, expressed
    /// against the parent integer.
    pub const fn narrow(self, inner: BitfieldSpec) -> Result<Self, SpecError> {
        Self::new((inner.mask << self.shift) & self.mask)
    }
}

/// An accessor narrowed to some of its bits.
#[derive(Clone, Copy, Debug)]
pub struct Bits<A> {
    inner: A,
    spec: BitfieldSpec,
}

impl<A> Bits<A> {
    pub const fn new(inner: A, spec: BitfieldSpec) -> Self {
        Self { inner, spec }
    }

    pub const fn spec(&self) -> BitfieldSpec {
        self.spec
    }
}

impl<A: Accessor<Value = u64>> Accessor for Bits<A> {
    type Value = u64;

    fn span(&self) -> Range<usize> {
        self.inner.span()
    }

    fn load(&self, bytes: &[u8]) -> u64 {
        self.spec.extract(self.inner.load(bytes))
    }

    fn store(&self, bytes: &mut [u8], value: u64) {
        let raw = self.inner.load(bytes);
        self.inner.store(bytes, self.spec.insert(raw, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldSpec;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    const ATTRIBUTES: FieldSpec = FieldSpec::u8("bmAttributes", 0);
    const TRANSFER: Bits<FieldSpec> = Bits::new(ATTRIBUTES, BitfieldSpec::checked(0x03));
    const SYNC: Bits<FieldSpec> = Bits::new(ATTRIBUTES, BitfieldSpec::checked(0x0c));
    const USAGE: Bits<FieldSpec> = Bits::new(ATTRIBUTES, BitfieldSpec::checked(0x30));

    #[test]
    fn zero_mask() {
        assert_eq!(BitfieldSpec::new(0), Err(SpecError::ZeroMask));
        assert_eq!(BitfieldSpec::bits(3, 0), Err(SpecError::ZeroMask));
        assert_eq!(BitfieldSpec::bits(64, 1), Err(SpecError::ZeroMask));
    }

    #[test]
    fn bit_ranges() {
        assert_eq!(BitfieldSpec::bits(4, 2), BitfieldSpec::new(0x30));
        assert_eq!(BitfieldSpec::bits(60, 8).map(|b| b.mask()), Ok(0xf << 60));
        assert_eq!(BitfieldSpec::bit(7).shift(), 7);
    }

    #[test]
    fn independent_subfields() {
        let mut buf = [0b0010_0101];
        assert_eq!(TRANSFER.load(&buf), 1);
        assert_eq!(SYNC.load(&buf), 1);
        assert_eq!(USAGE.load(&buf), 2);

        SYNC.store(&mut buf, 3);
        assert_eq!(buf, [0b0010_1101]);
        assert_eq!(TRANSFER.load(&buf), 1);
        assert_eq!(USAGE.load(&buf), 2);
    }

    #[test]
    fn oversized_value_is_clipped() {
        let mut buf = [0xff];
        TRANSFER.store(&mut buf, 0b100);
        assert_eq!(buf, [0xfc]);
    }

    #[test]
    fn narrowing_is_associative() {
        let outer = BitfieldSpec::checked(0x0ff0);
        let inner = BitfieldSpec::checked(0x3c);
        let chained = Bits::new(Bits::new(FieldSpec::u16("w", 0), outer), inner);
        let flat = Bits::new(FieldSpec::u16("w", 0), outer.narrow(inner).unwrap());
        assert_eq!(flat.spec().mask(), 0x03c0);

        let mut a = [0x5a, 0xa5];
        let mut b = a;
        assert_eq!(chained.load(&a), flat.load(&a));
        chained.store(&mut a, 0x9);
        flat.store(&mut b, 0x9);
        assert_eq!(a, b);
    }

    #[quickcheck]
    fn insert_preserves_outside_bits(mask: u64, raw: u64, value: u64) -> TestResult {
        let Ok(spec) = BitfieldSpec::new(mask) else {
            return TestResult::discard();
        };
        TestResult::from_bool(spec.insert(raw, value) & !mask == raw & !mask)
    }

    #[quickcheck]
    fn extract_then_insert_is_identity(mask: u64, raw: u64) -> TestResult {
        let Ok(spec) = BitfieldSpec::new(mask) else {
            return TestResult::discard();
        };
        TestResult::from_bool(spec.insert(raw, spec.extract(raw)) == raw)
    }

    #[quickcheck]
    fn store_preserves_neighbours(raw: u8, value: u8) -> bool {
        let mut buf = [raw];
        SYNC.store(&mut buf, value.into());
        buf[0] & !0x0c == raw & !0x0c && SYNC.load(&buf) == u64::from(value & 0x3)
    }
}
