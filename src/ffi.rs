//! FFI bindings for the habit engine
//!
//! This module provides C-compatible functions for calling the engine from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `habits_free_string`.
//!
//! Instants are passed as Unix milliseconds; offsets as minutes east of UTC.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::clock::EngineContext;
use crate::community::{self, DistributionCache, DistributionSnapshot};
use crate::config::CommunityConfig;
use crate::pipeline::dashboard_from_json;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

fn instant_from_millis(now_ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(now_ms).single()
}

// ============================================================================
// Stateless API
// ============================================================================

/// Build the dashboard from `{ "habits": [...], "logs": [...] }` JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `habits_free_string`.
/// - Returns NULL on error; call `habits_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn habits_dashboard_json(
    json: *const c_char,
    now_ms: i64,
    offset_minutes: i32,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let now = match instant_from_millis(now_ms) {
        Some(now) => now,
        None => {
            set_last_error("Timestamp out of range");
            return ptr::null_mut();
        }
    };

    let ctx = EngineContext::with_offset_minutes(now, offset_minutes);
    match dashboard_from_json(&json_str, &ctx) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Generate a reproducible community snapshot and return it as JSON.
///
/// # Safety
/// - `behavior_id` and `mode` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `habits_free_string`.
/// - Returns NULL on error; call `habits_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn habits_community_snapshot(
    behavior_id: *const c_char,
    mode: *const c_char,
    seed: u64,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    let behavior = match cstr_to_string(behavior_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid behavior_id string pointer");
            return ptr::null_mut();
        }
    };

    let mode_str = match cstr_to_string(mode) {
        Some(s) => s,
        None => {
            set_last_error("Invalid mode string pointer");
            return ptr::null_mut();
        }
    };

    let now = match instant_from_millis(now_ms) {
        Some(now) => now,
        None => {
            set_last_error("Timestamp out of range");
            return ptr::null_mut();
        }
    };

    let snapshot =
        community::generate_seeded(&behavior, &mode_str, &CommunityConfig::default(), now, seed);
    match serde_json::to_string(&snapshot) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Estimate the percentile (0-100) of `score` within a snapshot JSON.
///
/// The result is an approximation: participants are assumed to be spread
/// evenly within each score bucket.
///
/// # Safety
/// - `snapshot_json` must be a valid null-terminated C string.
/// - Returns a negative value on error; call `habits_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn habits_estimate_percentile(
    snapshot_json: *const c_char,
    score: f64,
) -> f64 {
    clear_last_error();

    let json_str = match cstr_to_string(snapshot_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid snapshot string pointer");
            return -1.0;
        }
    };

    match serde_json::from_str::<DistributionSnapshot>(&json_str) {
        Ok(snapshot) => community::estimate_percentile(score, &snapshot),
        Err(e) => {
            set_last_error(&e.to_string());
            -1.0
        }
    }
}

// ============================================================================
// Community Cache API
// ============================================================================

/// Opaque handle to a DistributionCache
pub struct CommunityCacheHandle {
    cache: DistributionCache,
    rng: StdRng,
}

/// Create an empty community cache.
///
/// # Safety
/// - Returns a pointer to a newly allocated cache.
/// - Must be freed with `habits_cache_free`.
#[no_mangle]
pub unsafe extern "C" fn habits_cache_new() -> *mut CommunityCacheHandle {
    clear_last_error();

    let handle = Box::new(CommunityCacheHandle {
        cache: DistributionCache::new(),
        rng: StdRng::from_entropy(),
    });
    Box::into_raw(handle)
}

/// Free a community cache.
///
/// # Safety
/// - `cache` must be a valid pointer returned by `habits_cache_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn habits_cache_free(cache: *mut CommunityCacheHandle) {
    if !cache.is_null() {
        drop(Box::from_raw(cache));
    }
}

/// Return the cached snapshot for a behavior, generating one on a miss.
///
/// # Safety
/// - `cache` must be a valid pointer returned by `habits_cache_new`.
/// - `behavior_id` and `mode` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `habits_free_string`.
/// - Returns NULL on error; call `habits_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn habits_cache_get_or_create(
    cache: *mut CommunityCacheHandle,
    behavior_id: *const c_char,
    mode: *const c_char,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if cache.is_null() {
        set_last_error("Null cache pointer");
        return ptr::null_mut();
    }

    let handle = &mut *cache;

    let behavior = match cstr_to_string(behavior_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid behavior_id string pointer");
            return ptr::null_mut();
        }
    };

    let mode_str = match cstr_to_string(mode) {
        Some(s) => s,
        None => {
            set_last_error("Invalid mode string pointer");
            return ptr::null_mut();
        }
    };

    let now = match instant_from_millis(now_ms) {
        Some(now) => now,
        None => {
            set_last_error("Timestamp out of range");
            return ptr::null_mut();
        }
    };

    let config = CommunityConfig::default();
    let snapshot = handle
        .cache
        .get_or_create(&behavior, &mode_str, &config, now, &mut handle.rng);
    match serde_json::to_string(snapshot) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Drop the cached snapshot for a behavior. Returns 1 if one was removed, 0 otherwise.
///
/// # Safety
/// - `cache` must be a valid pointer returned by `habits_cache_new`.
/// - `behavior_id` must be a valid null-terminated C string.
/// - Returns -1 on error.
#[no_mangle]
pub unsafe extern "C" fn habits_cache_invalidate(
    cache: *mut CommunityCacheHandle,
    behavior_id: *const c_char,
) -> i32 {
    clear_last_error();

    if cache.is_null() {
        set_last_error("Null cache pointer");
        return -1;
    }

    let handle = &mut *cache;

    match cstr_to_string(behavior_id) {
        Some(behavior) => handle.cache.invalidate(&behavior).is_some() as i32,
        None => {
            set_last_error("Invalid behavior_id string pointer");
            -1
        }
    }
}

/// Save the cache to JSON.
///
/// # Safety
/// - `cache` must be a valid pointer returned by `habits_cache_new`.
/// - Returns a newly allocated string that must be freed with `habits_free_string`.
/// - Returns NULL on error; call `habits_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn habits_cache_save(cache: *mut CommunityCacheHandle) -> *mut c_char {
    clear_last_error();

    if cache.is_null() {
        set_last_error("Null cache pointer");
        return ptr::null_mut();
    }

    let handle = &*cache;

    match handle.cache.to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Replace the cache contents with snapshots loaded from JSON.
///
/// # Safety
/// - `cache` must be a valid pointer returned by `habits_cache_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `habits_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn habits_cache_load(
    cache: *mut CommunityCacheHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if cache.is_null() {
        set_last_error("Null cache pointer");
        return -1;
    }

    let handle = &mut *cache;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match DistributionCache::from_json(&json_str) {
        Ok(loaded) => {
            handle.cache = loaded;
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by habit engine functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a habit engine function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn habits_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next habit engine call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn habits_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the habit engine library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn habits_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
