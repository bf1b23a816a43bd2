//! FFI bindings to the VIX library.
//!
//! This module contains low-level C bindings and the [`Backend`](crate::Backend)
//! built on them. Users should prefer the safe wrappers in the parent modules.

pub mod error;
mod native;
pub mod raw;

pub use native::NativeLibrary;
