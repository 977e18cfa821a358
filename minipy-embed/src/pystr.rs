// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge Rust and Python string types.

use {
    libc::{c_void, wchar_t},
    pyo3::ffi as pyffi,
    std::{
        ffi::{CString, OsStr},
        ptr::null_mut,
    },
};

#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;

/// A wide string allocated by the Python runtime.
///
/// Instances are produced by `Py_DecodeLocale()` and are released with
/// `PyMem_RawFree()` when dropped. Both functions may be called before the
/// interpreter is initialized.
#[derive(Debug)]
pub struct OwnedPyStr {
    data: *mut wchar_t,
}

impl OwnedPyStr {
    pub fn as_wchar_ptr(&self) -> *const wchar_t {
        self.data
    }

    /// Decode a str using the current locale.
    pub fn from_str(s: &str) -> Result<Self, &'static str> {
        // We need to convert to a C string so there is a terminal NULL
        // otherwise Py_DecodeLocale() can get confused.
        let cs = CString::new(s).map_err(|_| "source string has NULL bytes")?;

        Self::decode_cstring(cs)
    }

    /// Decode an OS string using the current locale.
    ///
    /// On POSIX the raw argument bytes are decoded, so arguments that are not
    /// valid UTF-8 are still accepted as long as the locale can represent them.
    #[cfg(unix)]
    pub fn from_osstr(s: &OsStr) -> Result<Self, &'static str> {
        let cs = CString::new(s.as_bytes()).map_err(|_| "source string has NULL bytes")?;

        Self::decode_cstring(cs)
    }

    #[cfg(windows)]
    pub fn from_osstr(s: &OsStr) -> Result<Self, &'static str> {
        let s = s.to_str().ok_or("source string is not valid Unicode")?;

        Self::from_str(s)
    }

    /// Read the decoded value back as a Rust string, replacing invalid values.
    pub fn to_string_lossy(&self) -> String {
        let mut res = String::new();

        let mut offset = 0;
        loop {
            let c = unsafe { *self.data.offset(offset) };
            if c == 0 {
                break;
            }

            res.push(char::from_u32(c as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
            offset += 1;
        }

        res
    }

    fn decode_cstring(cs: CString) -> Result<Self, &'static str> {
        let size: *mut pyffi::Py_ssize_t = null_mut();
        let ptr = unsafe { pyffi::Py_DecodeLocale(cs.as_ptr(), size) };

        if ptr.is_null() {
            Err("could not convert str to Python string")
        } else {
            Ok(OwnedPyStr { data: ptr })
        }
    }
}

impl Drop for OwnedPyStr {
    fn drop(&mut self) {
        unsafe { pyffi::PyMem_RawFree(self.data as *mut c_void) }
    }
}
