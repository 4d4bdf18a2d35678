//! FFI bindings for Carewatch
//!
//! This module provides C-compatible functions for calling Carewatch from other
//! languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using
//! `carewatch_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::pipeline::{evaluate_perimeter, vitals_series};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Convert a Rust string to a C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Build a dense vitals series.
///
/// `records_json` holds telemetry records (JSON array or NDJSON) and
/// `request_json` a series request:
/// `{"device_address", "metric", "period", "reference", "timezone"}`.
///
/// # Safety
/// - `records_json` and `request_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `carewatch_free_string`.
/// - Returns NULL on error; call `carewatch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn carewatch_vitals_series(
    records_json: *const c_char,
    request_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let records = match cstr_to_string(records_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid records string pointer");
            return ptr::null_mut();
        }
    };

    let request = match cstr_to_string(request_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid request string pointer");
            return ptr::null_mut();
        }
    };

    match vitals_series(&records, &request) {
        Ok(payload) => string_to_cstr(&payload),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Evaluate one perimeter check.
///
/// `check_json` is `{"perimeter", "location", "state"}`; missing perimeter or
/// location leaves the state unchanged.
///
/// # Safety
/// - `check_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `carewatch_free_string`.
/// - Returns NULL on error; call `carewatch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn carewatch_evaluate_perimeter(check_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let check = match cstr_to_string(check_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid check string pointer");
            return ptr::null_mut();
        }
    };

    match evaluate_perimeter(&check) {
        Ok(evaluation) => string_to_cstr(&evaluation),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by Carewatch functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Carewatch function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn carewatch_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Carewatch function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn carewatch_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Carewatch library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn carewatch_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
