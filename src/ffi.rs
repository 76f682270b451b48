//! FFI bindings for Empath
//!
//! This module provides C-compatible functions for driving an engine from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `empath_free_string`.
//!
//! An engine handle may be shared between threads; every operation on it takes
//! `&self` internally.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use serde::Serialize;

use crate::engine::EmpathEngine;
use crate::error::EngineError;
use crate::history::DEFAULT_AVERAGE_WINDOW_MS;
use crate::schema::CycleInput;

// Thread-local storage for the last error message
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

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize `value` into a caller-owned C string, recording failures
fn json_to_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&EngineError::from(e).to_string());
            ptr::null_mut()
        }
    }
}

/// Negative limits mean "everything"
fn limit_from(limit: i32) -> Option<usize> {
    usize::try_from(limit).ok()
}

/// Borrow the engine behind a handle, recording an error when it is null
unsafe fn engine_ref<'a>(handle: *const EmpathEngineHandle) -> Option<&'a EmpathEngine> {
    if handle.is_null() {
        set_last_error("Null engine pointer");
        return None;
    }
    Some(&(*handle).engine)
}

// ============================================================================
// Engine lifecycle
// ============================================================================

/// Opaque handle to an EmpathEngine
pub struct EmpathEngineHandle {
    engine: EmpathEngine,
}

/// Create a new engine.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string holding an
///   engine configuration document. NULL selects the defaults.
/// - Returns a pointer that must be freed with `empath_engine_free`.
/// - Returns NULL on error; call `empath_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn empath_engine_new(config_json: *const c_char) -> *mut EmpathEngineHandle {
    clear_last_error();

    let engine = if config_json.is_null() {
        Ok(EmpathEngine::new())
    } else {
        match cstr_to_string(config_json) {
            Some(json) => EmpathEngine::from_config_json(&json),
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        }
    };

    match engine {
        Ok(engine) => Box::into_raw(Box::new(EmpathEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `empath_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn empath_engine_free(engine: *mut EmpathEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

// ============================================================================
// Cycle processing
// ============================================================================

/// Run one cycle from an `empath.cycle.v1` JSON document.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `empath_engine_new`.
/// - `cycle_json` must be a valid null-terminated C string.
/// - Returns the cycle outcome as JSON in a newly allocated string that must be
///   freed with `empath_free_string`.
/// - Returns NULL on error; call `empath_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn empath_engine_process(
    engine: *const EmpathEngineHandle,
    cycle_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_ref(engine) else {
        return ptr::null_mut();
    };

    let json_str = match cstr_to_string(cycle_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let outcome = serde_json::from_str::<CycleInput>(&json_str)
        .map_err(EngineError::from)
        .and_then(|input| engine.process_input(&input));

    match outcome {
        Ok(outcome) => json_to_cstr(&outcome),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Most recent states as a JSON array, oldest first.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `empath_engine_new`.
/// - A negative `limit` returns every retained state.
/// - Returns a newly allocated string that must be freed with `empath_free_string`.
#[no_mangle]
pub unsafe extern "C" fn empath_engine_recent(
    engine: *const EmpathEngineHandle,
    limit: i32,
) -> *mut c_char {
    clear_last_error();

    match engine_ref(engine) {
        Some(engine) => json_to_cstr(&engine.get_recent(limit_from(limit))),
        None => ptr::null_mut(),
    }
}

/// Mean state over the last `window_ms` milliseconds as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `empath_engine_new`.
/// - A negative `window_ms` selects the default five-minute window.
/// - Returns the JSON literal `null` when no state falls inside the window.
/// - Returns a newly allocated string that must be freed with `empath_free_string`.
#[no_mangle]
pub unsafe extern "C" fn empath_engine_average(
    engine: *const EmpathEngineHandle,
    window_ms: i64,
) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_ref(engine) else {
        return ptr::null_mut();
    };

    let window_ms = if window_ms < 0 {
        DEFAULT_AVERAGE_WINDOW_MS
    } else {
        window_ms
    };

    json_to_cstr(&engine.get_average_state(chrono::Duration::milliseconds(window_ms)))
}

/// Most recent actions as a JSON array, oldest first.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `empath_engine_new`.
/// - A negative `limit` returns every retained action.
/// - Returns a newly allocated string that must be freed with `empath_free_string`.
#[no_mangle]
pub unsafe extern "C" fn empath_engine_action_history(
    engine: *const EmpathEngineHandle,
    limit: i32,
) -> *mut c_char {
    clear_last_error();

    match engine_ref(engine) {
        Some(engine) => json_to_cstr(&engine.get_action_history(limit_from(limit))),
        None => ptr::null_mut(),
    }
}

// ============================================================================
// Thresholds
// ============================================================================

/// Update a rule threshold by name.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `empath_engine_new`.
/// - `name` must be a valid null-terminated C string.
/// - Returns 0 when applied, 1 when the value was outside [0, 1] and ignored,
///   and -1 on error (call `empath_last_error` for the message).
#[no_mangle]
pub unsafe extern "C" fn empath_engine_update_threshold(
    engine: *const EmpathEngineHandle,
    name: *const c_char,
    value: f64,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_ref(engine) else {
        return -1;
    };

    let name_str = match cstr_to_string(name) {
        Some(s) => s,
        None => {
            set_last_error("Invalid threshold name pointer");
            return -1;
        }
    };

    match engine.update_threshold_by_name(&name_str, value) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Empath functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Empath function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn empath_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Empath function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn empath_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Empath library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn empath_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_cycle_json() -> CString {
        CString::new(
            r#"{
                "schema_version": "empath.cycle.v1",
                "timestamp": "2024-01-15T14:00:00Z",
                "readings": [{
                    "source": "behavioral",
                    "confidence": 0.8,
                    "typing_speed": 80.0,
                    "error_rate": 0.05,
                    "mouse_movements": 50.0,
                    "click_rate": 5.0,
                    "pause_duration": 1000.0
                }]
            }"#,
        )
        .unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        empath_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        unsafe {
            let engine = empath_engine_new(ptr::null());
            assert!(!engine.is_null());

            let cycle = sample_cycle_json();
            let outcome = take_string(empath_engine_process(engine, cycle.as_ptr()));
            let outcome: serde_json::Value = serde_json::from_str(&outcome).unwrap();
            assert_eq!(outcome["actions"][0]["type"], "deep-work");
            assert_eq!(outcome["model"]["sources"][0], "behavioral");

            let recent = take_string(empath_engine_recent(engine, -1));
            let recent: Vec<serde_json::Value> = serde_json::from_str(&recent).unwrap();
            assert_eq!(recent.len(), 1);

            let history = take_string(empath_engine_action_history(engine, 1));
            let history: Vec<serde_json::Value> = serde_json::from_str(&history).unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0]["type"], "ui-theme");

            // the cycle was stamped in 2024, far outside a one-minute window
            let average = take_string(empath_engine_average(engine, 60_000));
            assert_eq!(average, "null");

            empath_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_engine_with_config() {
        unsafe {
            let config = CString::new(r#"{ "history_capacity": 1 }"#).unwrap();
            let engine = empath_engine_new(config.as_ptr());
            assert!(!engine.is_null());

            let cycle = sample_cycle_json();
            for _ in 0..3 {
                take_string(empath_engine_process(engine, cycle.as_ptr()));
            }

            let recent = take_string(empath_engine_recent(engine, -1));
            let recent: Vec<serde_json::Value> = serde_json::from_str(&recent).unwrap();
            assert_eq!(recent.len(), 1);

            empath_engine_free(engine);

            let bad = CString::new(r#"{ "history_capacity": 0 }"#).unwrap();
            assert!(empath_engine_new(bad.as_ptr()).is_null());
            assert!(!empath_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_update_threshold() {
        unsafe {
            let engine = empath_engine_new(ptr::null());

            let stress = CString::new("stress").unwrap();
            assert_eq!(empath_engine_update_threshold(engine, stress.as_ptr(), 0.5), 0);
            assert_eq!(empath_engine_update_threshold(engine, stress.as_ptr(), 1.5), 1);

            let unknown = CString::new("mood").unwrap();
            assert_eq!(empath_engine_update_threshold(engine, unknown.as_ptr(), 0.5), -1);

            assert_eq!((*engine).engine.get_thresholds().high_stress, 0.5);
            empath_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let engine = empath_engine_new(ptr::null());
            let invalid_json = CString::new("not json").unwrap();

            let result = empath_engine_process(engine, invalid_json.as_ptr());
            assert!(result.is_null());

            let error = empath_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            assert!(empath_engine_recent(ptr::null(), 10).is_null());
            empath_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = empath_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, crate::ENGINE_VERSION);
        }
    }
}
