//! FFI layer for UI hosts.
//!
//! This module provides C-compatible functions that a UI shell (Dart FFI,
//! a WebView bridge, ...) can call. All data crosses the boundary as JSON
//! strings.
//!
//! # Memory Management
//!
//! - Strings returned by `quotesync_*` functions are allocated by Rust
//! - Caller must free them with `quotesync_string_free`
//! - Book pointers must be freed with `quotesync_book_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{BookSnapshot, CategoryFilter, QuoteBook, RecordSet, SyncTrigger};
use std::ffi::{c_char, CStr, CString};
use std::ptr;

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

fn error_string(message: impl Into<String>) -> *mut c_char {
    to_c_string(FfiResult::<()>::err(message).to_json())
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `quotesync_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        // Interior null byte; report it as JSON instead
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .map(CString::into_raw)
            .unwrap_or(ptr::null_mut()),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

// ============================================================================
// Book Lifecycle
// ============================================================================

/// Create a new quote book.
///
/// # Arguments
/// - `snapshot_json`: JSON string of BookSnapshot, or null for an empty book
///
/// # Returns
/// Pointer to QuoteBook, or null if the snapshot is invalid (including
/// strings that are not UTF-8).
///
/// # Safety
/// - `snapshot_json` must be a valid null-terminated C string or null
/// - Caller must free the returned pointer with `quotesync_book_free`
#[no_mangle]
pub unsafe extern "C" fn quotesync_book_new(snapshot_json: *const c_char) -> *mut QuoteBook {
    let book = if snapshot_json.is_null() {
        QuoteBook::default()
    } else {
        // Non-null but not UTF-8 is an invalid snapshot, not an empty one
        let json = match from_c_string(snapshot_json) {
            Some(json) => json,
            None => return ptr::null_mut(),
        };
        let snapshot = match BookSnapshot::from_json(&json) {
            Ok(s) => s,
            Err(_) => return ptr::null_mut(),
        };
        match QuoteBook::from_snapshot(snapshot) {
            Ok(book) => book,
            Err(_) => return ptr::null_mut(),
        }
    };

    Box::into_raw(Box::new(book))
}

/// Free a quote book.
///
/// # Safety
/// - `book` must be a valid pointer from `quotesync_book_new`
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn quotesync_book_free(book: *mut QuoteBook) {
    if !book.is_null() {
        drop(Box::from_raw(book));
    }
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `quotesync_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn quotesync_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Book Operations
// ============================================================================

/// Reconcile the book against a fetched server list.
///
/// # Arguments
/// - `server_json`: JSON array of quotes as returned by the server
/// - `manual`: non-zero when the user asked for the sync
/// - `timestamp`: Timestamp in milliseconds, recorded on the backup
///
/// # Returns
/// JSON string: `{"ok": SyncReport}` or `{"error": "message"}`
///
/// # Safety
/// - `book` must be a valid pointer from `quotesync_book_new` or null
/// - `server_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `quotesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn quotesync_book_apply_server(
    book: *mut QuoteBook,
    server_json: *const c_char,
    manual: i32,
    timestamp: u64,
) -> *mut c_char {
    let book = match book.as_mut() {
        Some(b) => b,
        None => return error_string("null book pointer"),
    };

    let server_str = match from_c_string(server_json) {
        Some(s) => s,
        None => return error_string("invalid server JSON"),
    };

    let server: RecordSet = match serde_json::from_str(&server_str) {
        Ok(s) => s,
        Err(e) => return error_string(format!("parse error: {}", e)),
    };

    if let Err(e) = server.ensure_unique_keys() {
        return error_string(e.to_string());
    }

    let trigger = if manual != 0 {
        SyncTrigger::Manual
    } else {
        SyncTrigger::Periodic
    };

    let report = book.apply_server_snapshot(&server, trigger, timestamp);
    to_c_string(FfiResult::ok(report).to_json())
}

/// Restore the quotes from before the latest merge.
///
/// # Returns
/// JSON string: `{"ok": [Quote, ...]}` or `{"error": "message"}`
///
/// # Safety
/// - `book` must be a valid pointer from `quotesync_book_new` or null
/// - Caller must free the returned string with `quotesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn quotesync_book_revert(book: *mut QuoteBook) -> *mut c_char {
    let book = match book.as_mut() {
        Some(b) => b,
        None => return error_string("null book pointer"),
    };

    match book.revert() {
        Ok(quotes) => to_c_string(FfiResult::ok(quotes).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

/// Add a user-entered quote.
///
/// # Returns
/// JSON string: `{"ok": Quote}` or `{"error": "message"}`
///
/// # Safety
/// - `book` must be a valid pointer from `quotesync_book_new` or null
/// - `text` and `category` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `quotesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn quotesync_book_add_quote(
    book: *mut QuoteBook,
    text: *const c_char,
    category: *const c_char,
    timestamp: u64,
) -> *mut c_char {
    let book = match book.as_mut() {
        Some(b) => b,
        None => return error_string("null book pointer"),
    };

    let (text, category) = match (from_c_string(text), from_c_string(category)) {
        (Some(t), Some(c)) => (t, c),
        _ => return error_string("invalid text or category"),
    };

    match book.add_quote(&text, &category, timestamp) {
        Ok(quote) => to_c_string(FfiResult::ok(quote).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

/// List quotes, optionally narrowed to a category.
///
/// # Arguments
/// - `category`: category name, `"all"`, or null to use the book's filter.
///   A non-null value also becomes the book's selected filter.
///
/// # Returns
/// JSON string: `{"ok": [Quote, ...]}` or `{"error": "message"}`
///
/// # Safety
/// - `book` must be a valid pointer from `quotesync_book_new` or null
/// - `category` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `quotesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn quotesync_book_quotes(
    book: *mut QuoteBook,
    category: *const c_char,
) -> *mut c_char {
    let book = match book.as_mut() {
        Some(b) => b,
        None => return error_string("null book pointer"),
    };

    if let Some(category) = from_c_string(category) {
        book.set_filter(CategoryFilter::from(category));
    }

    to_c_string(FfiResult::ok(book.filtered()).to_json())
}

/// Pick a random quote from the filtered set.
///
/// # Arguments
/// - `random`: any random number from the host; it is reduced modulo the
///   number of matching quotes
///
/// # Returns
/// JSON string: `{"ok": Quote}`, `{"ok": null}` when no quote matches the
/// filter, or `{"error": "message"}`
///
/// # Safety
/// - `book` must be a valid pointer from `quotesync_book_new` or null
/// - Caller must free the returned string with `quotesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn quotesync_book_random_quote(
    book: *mut QuoteBook,
    random: u64,
) -> *mut c_char {
    let book = match book.as_mut() {
        Some(b) => b,
        None => return error_string("null book pointer"),
    };

    let shown = book.random_quote(|len| (random % len as u64) as usize);
    to_c_string(FfiResult::ok(shown).to_json())
}

// ============================================================================
// Snapshots
// ============================================================================

/// Export book state as a snapshot.
///
/// # Returns
/// JSON string: `{"ok": BookSnapshot}` or `{"error": "message"}`
///
/// # Safety
/// - `book` must be a valid pointer from `quotesync_book_new` or null
/// - Caller must free the returned string with `quotesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn quotesync_book_export(book: *const QuoteBook) -> *mut c_char {
    let book = match book.as_ref() {
        Some(b) => b,
        None => return error_string("null book pointer"),
    };

    to_c_string(FfiResult::ok(book.export_state()).to_json())
}

/// Append quotes from a JSON array.
///
/// # Returns
/// JSON string: `{"ok": ImportSummary}` or `{"error": "message"}`
///
/// # Safety
/// - `book` must be a valid pointer from `quotesync_book_new` or null
/// - `quotes_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `quotesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn quotesync_book_import(
    book: *mut QuoteBook,
    quotes_json: *const c_char,
) -> *mut c_char {
    let book = match book.as_mut() {
        Some(b) => b,
        None => return error_string("null book pointer"),
    };

    let quotes_str = match from_c_string(quotes_json) {
        Some(s) => s,
        None => return error_string("invalid quotes JSON"),
    };

    match book.import_json(&quotes_str) {
        Ok(summary) => to_c_string(FfiResult::ok(summary).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

// ============================================================================
// Utility
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn quotesync_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Get the snapshot format version.
#[no_mangle]
pub extern "C" fn quotesync_snapshot_format_version() -> u32 {
    crate::SNAPSHOT_FORMAT_VERSION
}
