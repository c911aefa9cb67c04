use crate::{
    error::DecodeError,
    schema::{Struct, StructSchema},
};
use alloc::vec::Vec;
use core::{fmt, ptr::NonNull, slice};

/// A bounds-known window over bytes owned by someone else.
///
/// Nothing decoded from a view reads outside it. The owner must keep the bytes alive
/// and unmodified for `'a`. Any number of threads may decode the same view at once
/// under that condition.
#[derive(Clone, Copy)]
pub struct MemoryView<'a> {
    bytes: &'a [u8],
}

impl<'a> MemoryView<'a> {
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Wraps a native buffer. A null `base` or zero `length` gives an empty view.
    ///
    /// # Safety
    ///
    /// Unless null, `base` must be valid for reads of `length` bytes for `'a`, and
    /// nothing may write to those bytes during `'a`.
    pub unsafe fn from_raw_parts(base: *const u8, length: usize) -> Self {
        if base.is_null() || length == 0 {
            return Self::new(&[]);
        }
        Self::new(slice::from_raw_parts(base, length))
    }

    pub fn base(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn decode<'s>(&self, schema: &'s StructSchema) -> Result<Struct<'s, &'a [u8]>, DecodeError> {
        Struct::decode(schema, self.bytes)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl AsRef<[u8]> for MemoryView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl fmt::Debug for MemoryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!(MemoryView))
            .field("base", &self.base())
            .field("length", &self.len())
            .finish()
    }
}

/// A native buffer released exactly once, when the lease is dropped.
///
/// Views borrow the lease, so none outlive the release.
pub struct Lease<F: FnOnce(NonNull<u8>, usize)> {
    base: NonNull<u8>,
    length: usize,
    release: Option<F>,
}

impl<F: FnOnce(NonNull<u8>, usize)> Lease<F> {
    /// # Safety
    ///
    /// `base` must be valid for reads of `length` bytes until `release` is called, and
    /// nothing may write to those bytes while the lease exists.
    pub unsafe fn new(base: NonNull<u8>, length: usize, release: F) -> Self {
        Self {
            base,
            length,
            release: Some(release),
        }
    }

    pub fn view(&self) -> MemoryView<'_> {
        // SAFETY: guaranteed by the caller of `new` until `release` runs in `drop`.
        unsafe { MemoryView::from_raw_parts(self.base.as_ptr(), self.length) }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Copies the buffer out, for use after the lease is gone.
    pub fn to_vec(&self) -> Vec<u8> {
        self.view().to_vec()
    }
}

impl<F: FnOnce(NonNull<u8>, usize)> Drop for Lease<F> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.base, self.length)
        }
    }
}

impl<F: FnOnce(NonNull<u8>, usize)> fmt::Debug for Lease<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!(Lease))
            .field("base", &self.base)
            .field("length", &self.length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldSpec;
    use alloc::boxed::Box;
    use core::cell::Cell;

    const FIELDS: [FieldSpec; 2] = [FieldSpec::u8("bLength", 0), FieldSpec::u16("wTotalLength", 2)];
    const HEADER: StructSchema = StructSchema::checked("header", 5, &FIELDS);

    /// Leases a leaked boxed slice of exactly `bytes.len()` bytes, counting releases.
    fn lease<'c>(bytes: &[u8], released: &'c Cell<usize>) -> Lease<impl FnOnce(NonNull<u8>, usize) + 'c> {
        let raw = Box::into_raw(bytes.to_vec().into_boxed_slice());
        let length = bytes.len();
        let base = NonNull::new(raw as *mut u8).unwrap();
        unsafe {
            Lease::new(base, length, move |base: NonNull<u8>, length| {
                released.set(released.get() + 1);
                drop(Box::from_raw(core::ptr::slice_from_raw_parts_mut(base.as_ptr(), length)));
            })
        }
    }

    #[test]
    fn null_is_empty() {
        let v = unsafe { MemoryView::from_raw_parts(core::ptr::null(), 12) };
        assert!(v.is_empty());
        assert!(matches!(
            v.decode(&HEADER),
            Err(DecodeError::TruncatedBuffer { needed: 5, actual: 0, .. })
        ));
    }

    #[test]
    fn exact_allocation_too_short() {
        let released = Cell::new(0);
        let l = lease(&[4, 0, 0x10, 0], &released);
        assert_eq!(
            l.view().decode(&HEADER).unwrap_err(),
            DecodeError::TruncatedBuffer {
                schema: "header",
                needed: 5,
                actual: 4
            }
        );
        drop(l);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn decode_and_copy_out() {
        let released = Cell::new(0);
        let l = lease(&[5, 0, 0x10, 0x01, 0xff], &released);
        assert_eq!(l.view().decode(&HEADER).unwrap().value("wTotalLength"), Some(0x110));
        let owned = l.to_vec();
        drop(l);
        assert_eq!(released.get(), 1);
        assert_eq!(HEADER.decode(&owned).unwrap().value("bLength"), Some(5));
    }
}
