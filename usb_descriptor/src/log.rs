//! Diagnostics, contingent on the `log` feature.
//!
//! Decoding never depends on these; they only report malformed input.

macro_rules! debug {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        ::log::debug!($($args)*)
    };
}

macro_rules! warn {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        ::log::warn!($($args)*)
    };
}
