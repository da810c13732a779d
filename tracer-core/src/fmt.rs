//! Logging shim: forwards to defmt when the `defmt` feature is on and expands
//! to nothing otherwise.

#![macro_use]
#![allow(unused_macros)]

macro_rules! debug {
    ($($x:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($x)*);
    }};
}

macro_rules! info {
    ($($x:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($x)*);
    }};
}

macro_rules! warn {
    ($($x:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($x)*);
    }};
}
