//! Error and string conversion utilities for FFI.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use super::raw::VixError;
use crate::codes::{self, ErrorCode};

/// Check a `VixError` and convert to a result.
///
/// Only the low 16 bits carry the code; flag bits above them do not make a
/// call fail.
pub fn check(err: VixError) -> Result<(), ErrorCode> {
    let code = ErrorCode::from_raw(err);
    if code.is_ok() {
        Ok(())
    } else {
        Err(code)
    }
}

/// Convert a Rust string for a native call.
///
/// Interior NULs cannot cross the boundary and are reported as
/// `VIX_E_INVALID_ARG`.
pub fn c_string(s: &str) -> Result<CString, ErrorCode> {
    CString::new(s).map_err(|_| codes::VIX_E_INVALID_ARG)
}

/// Like [`c_string`], keeping `None` as `None`.
pub fn c_string_opt(s: Option<&str>) -> Result<Option<CString>, ErrorCode> {
    s.map(c_string).transpose()
}

/// Pointer for an optional C string; null when absent.
pub fn opt_ptr(s: &Option<CString>) -> *const c_char {
    s.as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null())
}

/// Copy a library-owned string and free it.
///
/// # Safety
///
/// `p` must be null or a NUL-terminated buffer allocated by the library.
pub unsafe fn take_string(p: *mut c_char) -> String {
    if p.is_null() {
        return String::new();
    }
    let s = CStr::from_ptr(p).to_string_lossy().into_owned();
    super::raw::Vix_FreeBuffer(p.cast());
    s
}

/// Copy a library-owned blob and free it.
///
/// # Safety
///
/// `p` must be null or a buffer of at least `len` bytes allocated by the library.
pub unsafe fn take_blob(p: *mut c_char, len: i32) -> Vec<u8> {
    if p.is_null() {
        return Vec::new();
    }
    let len = usize::try_from(len).unwrap_or(0);
    let data = std::slice::from_raw_parts(p.cast::<u8>(), len).to_vec();
    super::raw::Vix_FreeBuffer(p.cast());
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::raw::VIX_OK;

    #[test]
    fn test_check() {
        assert_eq!(check(VIX_OK), Ok(()));
        assert_eq!(check(0x0001_0000_0000_03E8), Err(codes::VIX_E_INVALID_HANDLE));
    }

    #[test]
    fn test_check_ignores_flag_bits() {
        assert_eq!(check(0x0001_0000_0000_0000), Ok(()));
        assert_eq!(check(0xFFFF_0000_0000_0000), Ok(()));
    }

    #[test]
    fn test_interior_nul_is_invalid_arg() {
        assert_eq!(c_string("a\0b").unwrap_err(), codes::VIX_E_INVALID_ARG);
        assert!(c_string_opt(None).expect("None should convert").is_none());
    }
}
