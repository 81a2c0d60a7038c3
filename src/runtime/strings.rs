//! String primitives.
//!
//! A string handle is a `Box<String>` turned into a raw pointer. Every
//! function returning a handle returns a fresh owned string that the caller
//! releases with [`rt_string_free`]. Null handles read as the empty string.

#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::ffi::{c_char, CStr};

use super::{
    enum_name, record_fault, register_enum_name, track_allocation, track_release, write_output,
};

pub(crate) fn into_handle(value: String) -> *mut String {
    track_allocation(Box::into_raw(Box::new(value)))
}

pub(crate) fn as_str<'a>(handle: *const String) -> &'a str {
    if handle.is_null() {
        return "";
    }
    // Handles come from `into_handle` and stay alive until freed.
    unsafe { (*handle).as_str() }
}

pub(crate) fn format_float(value: f64) -> String {
    format!("{:.6}", value)
}

#[no_mangle]
pub extern "C" fn rt_string_new() -> *mut String {
    into_handle(String::new())
}

#[no_mangle]
pub extern "C" fn rt_string_from_cstr(text: *const c_char) -> *mut String {
    if text.is_null() {
        return rt_string_new();
    }
    let text = unsafe { CStr::from_ptr(text) };
    into_handle(text.to_string_lossy().into_owned())
}

/// Copies `src` into `dest`, allocating when `dest` is null.
#[no_mangle]
pub extern "C" fn rt_string_assign(dest: *mut String, src: *const String) -> *mut String {
    let value = String::from(as_str(src));
    if dest.is_null() {
        return into_handle(value);
    }
    if dest as *const String != src {
        unsafe { *dest = value };
    }
    dest
}

#[no_mangle]
pub extern "C" fn rt_string_concat(left: *const String, right: *const String) -> *mut String {
    let mut value = String::from(as_str(left));
    value.push_str(as_str(right));
    into_handle(value)
}

/// Three-way comparison: negative, zero or positive.
#[no_mangle]
pub extern "C" fn rt_string_compare(left: *const String, right: *const String) -> i32 {
    as_str(left).cmp(as_str(right)) as i32
}

#[no_mangle]
pub extern "C" fn rt_string_len(handle: *const String) -> i64 {
    as_str(handle).chars().count() as i64
}

/// Substring by character offset; out-of-range parts are clamped.
#[no_mangle]
pub extern "C" fn rt_string_substr(handle: *const String, start: i64, length: i64) -> *mut String {
    let text = as_str(handle);
    let count = text.chars().count() as i64;
    if start < 0 || start > count {
        record_fault(format!(
            "substring start {} out of bounds for length {}",
            start, count
        ));
        return rt_string_new();
    }
    if length <= 0 {
        return rt_string_new();
    }
    into_handle(
        text.chars()
            .skip(start as usize)
            .take(length as usize)
            .collect(),
    )
}

#[no_mangle]
pub extern "C" fn rt_string_upper(handle: *const String) -> *mut String {
    into_handle(as_str(handle).to_uppercase())
}

#[no_mangle]
pub extern "C" fn rt_string_lower(handle: *const String) -> *mut String {
    into_handle(as_str(handle).to_lowercase())
}

#[no_mangle]
pub extern "C" fn rt_string_trim(handle: *const String) -> *mut String {
    into_handle(String::from(as_str(handle).trim()))
}

#[no_mangle]
pub extern "C" fn rt_string_contains(handle: *const String, needle: *const String) -> i32 {
    as_str(handle).contains(as_str(needle)) as i32
}

#[no_mangle]
pub extern "C" fn rt_string_free(handle: *mut String) {
    if !handle.is_null() && track_release(handle) {
        drop(unsafe { Box::from_raw(handle) });
    }
}

/// Parses an integer; unparsable text yields 0.
#[no_mangle]
pub extern "C" fn rt_string_to_int(handle: *const String) -> i64 {
    let text = as_str(handle).trim();
    text.parse::<i64>()
        .or_else(|_| text.parse::<f64>().map(|value| value as i64))
        .unwrap_or(0)
}

/// Parses a float; unparsable text yields 0.
#[no_mangle]
pub extern "C" fn rt_string_to_float(handle: *const String) -> f64 {
    as_str(handle).trim().parse::<f64>().unwrap_or(0.0)
}

#[no_mangle]
pub extern "C" fn rt_int_to_string(value: i64) -> *mut String {
    into_handle(value.to_string())
}

#[no_mangle]
pub extern "C" fn rt_float_to_string(value: f64) -> *mut String {
    into_handle(format_float(value))
}

#[no_mangle]
pub extern "C" fn rt_bool_to_string(value: i32) -> *mut String {
    into_handle(String::from(if value != 0 { "true" } else { "false" }))
}

#[no_mangle]
pub extern "C" fn rt_enum_to_string(id: i32) -> *mut String {
    into_handle(enum_name(id))
}

#[no_mangle]
pub extern "C" fn rt_enum_register(id: i32, name: *const c_char) {
    if name.is_null() {
        return;
    }
    let name = unsafe { CStr::from_ptr(name) };
    register_enum_name(id, name.to_string_lossy().into_owned());
}

#[no_mangle]
pub extern "C" fn rt_print(handle: *const String, newline: i32) {
    if newline != 0 {
        write_output(&format!("{}\n", as_str(handle)));
    } else {
        write_output(as_str(handle));
    }
}
