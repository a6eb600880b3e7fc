//! C-FFI layer for exdef, for cgo and other FFI consumers.
//!
//! No normalization logic lives here. Every call parses its JSON arguments,
//! delegates to `exdef-core` and serializes the answer back to JSON.
//!
//! # Memory Contract
//!
//! All functions that return `*mut c_char` allocate via `CString`.
//! The caller MUST free the returned string by calling `exdef_free_string()`.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use exdef_core::{
    backend, def_fingerprint, normalize, verify, ExecutionDefinition, ExecutionResult,
    NormalizationState, NormalizeOptions,
};
use serde::de::DeserializeOwned;

/// Result from an exdef FFI call.
/// If `error` is null, the call succeeded and `result` contains the output.
/// If `error` is non-null, the call failed and `error` contains the error message.
/// The caller MUST free both `result` and `error` with `exdef_free_string()`.
#[repr(C)]
pub struct ExdefResult {
    pub result: *mut c_char,
    pub error: *mut c_char,
}

impl ExdefResult {
    fn ok(value: String) -> Self {
        ExdefResult {
            result: into_c_string(value),
            error: std::ptr::null_mut(),
        }
    }

    fn err(msg: String) -> Self {
        ExdefResult {
            result: std::ptr::null_mut(),
            error: into_c_string(msg),
        }
    }

    fn from_json<T: serde::Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(json) => ExdefResult::ok(json),
            Err(e) => ExdefResult::err(format!("Serialization error: {}", e)),
        }
    }
}

/// Interior NUL bytes cannot cross the C boundary; they are dropped
fn into_c_string(value: String) -> *mut c_char {
    let c = CString::new(value.replace('\0', "")).unwrap_or_default();
    c.into_raw()
}

/// Helper: convert a C string pointer to a Rust &str.
/// Returns None if the pointer is null or not valid UTF-8.
unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Read a JSON document from a C string argument
unsafe fn parse_arg<T: DeserializeOwned>(ptr: *const c_char, what: &str) -> Result<T, ExdefResult> {
    let text = cstr_to_str(ptr)
        .ok_or_else(|| ExdefResult::err(format!("null or invalid UTF-8 {}", what)))?;
    serde_json::from_str(text).map_err(|e| ExdefResult::err(format!("invalid {} JSON: {}", what, e)))
}

/// Normalize an execution definition.
/// Returns the JSON normalization state: `{ "normalized", "original", "n2oMap" }`.
///
/// # Safety
/// `definition` must be a valid null-terminated UTF-8 C string.
/// The caller must free the returned strings with `exdef_free_string()`.
#[no_mangle]
pub unsafe extern "C" fn exdef_normalize(
    definition: *const c_char,
    keep_removable_properties: bool,
) -> ExdefResult {
    let definition: ExecutionDefinition = match parse_arg(definition, "definition") {
        Ok(d) => d,
        Err(e) => return e,
    };

    let options = NormalizeOptions {
        keep_removable_properties,
    };
    match normalize(&definition, options) {
        Ok(state) => ExdefResult::from_json(&state),
        Err(e) => ExdefResult::err(e.to_string()),
    }
}

/// Translate a backend result computed for `state.normalized` back to the
/// caller's local ids and display names.
///
/// # Safety
/// `state` and `result` must be valid null-terminated UTF-8 C strings.
/// The caller must free the returned strings with `exdef_free_string()`.
#[no_mangle]
pub unsafe extern "C" fn exdef_denormalize(
    state: *const c_char,
    result: *const c_char,
) -> ExdefResult {
    let state: NormalizationState = match parse_arg(state, "state") {
        Ok(s) => s,
        Err(e) => return e,
    };
    let result: ExecutionResult = match parse_arg(result, "result") {
        Ok(r) => r,
        Err(e) => return e,
    };

    match backend::replay(&state, &result) {
        Ok(denormalized) => ExdefResult::from_json(&denormalized),
        Err(e) => ExdefResult::err(e.to_string()),
    }
}

/// Compute the SHA-256 fingerprint of an execution definition.
///
/// # Safety
/// `definition` must be a valid null-terminated UTF-8 C string.
/// The caller must free the returned strings with `exdef_free_string()`.
#[no_mangle]
pub unsafe extern "C" fn exdef_fingerprint(definition: *const c_char) -> ExdefResult {
    let definition: ExecutionDefinition = match parse_arg(definition, "definition") {
        Ok(d) => d,
        Err(e) => return e,
    };

    match def_fingerprint(&definition) {
        Ok(hash) => ExdefResult::ok(hash),
        Err(e) => ExdefResult::err(e.to_string()),
    }
}

/// Check referential integrity of an execution definition.
/// Returns JSON: { "valid": bool, "errors": [...], "warnings": [...] }
///
/// # Safety
/// `definition` must be a valid null-terminated UTF-8 C string.
/// The caller must free the returned strings with `exdef_free_string()`.
#[no_mangle]
pub unsafe extern "C" fn exdef_verify(definition: *const c_char) -> ExdefResult {
    let definition: ExecutionDefinition = match parse_arg(definition, "definition") {
        Ok(d) => d,
        Err(e) => return e,
    };

    let result = verify(&definition);
    let output = serde_json::json!({
        "valid": result.is_valid(),
        "errors": result.errors(),
        "warnings": result.warnings(),
    });
    ExdefResult::from_json(&output)
}

/// Free a string previously returned by an exdef FFI function.
///
/// # Safety
/// `ptr` must be a pointer previously returned by an exdef FFI function,
/// or null (in which case this is a no-op).
#[no_mangle]
pub unsafe extern "C" fn exdef_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"{
        "workspace": "demo",
        "attributes": [
            {"localIdentifier": "region", "displayForm": {"identifier": "label.region"}, "alias": "Region"}
        ],
        "measures": [
            {
                "localIdentifier": "revenue",
                "definition": {"measureDefinition": {"item": {"identifier": "fact.amount"}, "aggregation": "sum"}},
                "alias": "Revenue"
            }
        ],
        "dimensions": [{"itemIdentifiers": ["region", "measureGroup"]}]
    }"#;

    /// Take ownership of both strings of a result, freeing them
    fn take(result: ExdefResult) -> (Option<String>, Option<String>) {
        unsafe fn own(ptr: *mut c_char) -> Option<String> {
            if ptr.is_null() {
                return None;
            }
            let s = CStr::from_ptr(ptr).to_string_lossy().into_owned();
            exdef_free_string(ptr);
            Some(s)
        }
        unsafe { (own(result.result), own(result.error)) }
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn test_normalize_returns_state() {
        let input = c(DEFINITION);
        let (result, error) = take(unsafe { exdef_normalize(input.as_ptr(), false) });
        assert!(error.is_none(), "{:?}", error);

        let state: serde_json::Value = serde_json::from_str(&result.unwrap()).unwrap();
        assert_eq!(state["n2oMap"]["m_fact.amount_sum"], "revenue");
        assert_eq!(state["n2oMap"]["a_label.region"], "region");
        assert!(state["normalized"]["measures"][0].get("alias").is_none());
    }

    #[test]
    fn test_normalize_keep_removable() {
        let input = c(DEFINITION);
        let (result, _) = take(unsafe { exdef_normalize(input.as_ptr(), true) });
        let state: serde_json::Value = serde_json::from_str(&result.unwrap()).unwrap();
        assert_eq!(state["normalized"]["measures"][0]["alias"], "Revenue");
    }

    #[test]
    fn test_denormalize_round_trip() {
        let input = c(DEFINITION);
        let (state, _) = take(unsafe { exdef_normalize(input.as_ptr(), false) });
        let state = c(&state.unwrap());

        let backend_result = c(r##"{
            "dimensions": [{"headers": [
                {"attributeHeader": {"localIdentifier": "a_label.region", "name": "Region label"}},
                {"measureGroupHeader": {"items": [
                    {"measureHeaderItem": {"localIdentifier": "m_fact.amount_sum", "name": "Sum", "format": "#,##0"}}
                ]}}
            ]}]
        }"##);
        let (result, error) =
            take(unsafe { exdef_denormalize(state.as_ptr(), backend_result.as_ptr()) });
        assert!(error.is_none(), "{:?}", error);

        let result: serde_json::Value = serde_json::from_str(&result.unwrap()).unwrap();
        let headers = &result["dimensions"][0]["headers"];
        assert_eq!(headers[0]["attributeHeader"]["localIdentifier"], "region");
        assert_eq!(headers[0]["attributeHeader"]["name"], "Region");
        let measure = &headers[1]["measureGroupHeader"]["items"][0]["measureHeaderItem"];
        assert_eq!(measure["localIdentifier"], "revenue");
        assert_eq!(measure["name"], "Revenue");
    }

    #[test]
    fn test_fingerprint_is_hex() {
        let input = c(DEFINITION);
        let (hash, error) = take(unsafe { exdef_fingerprint(input.as_ptr()) });
        assert!(error.is_none());
        let hash = hash.unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_reports_dangling_reference() {
        let input = c(r#"{
            "workspace": "demo",
            "dimensions": [{"itemIdentifiers": ["ghost"]}]
        }"#);
        let (result, _) = take(unsafe { exdef_verify(input.as_ptr()) });
        let report: serde_json::Value = serde_json::from_str(&result.unwrap()).unwrap();
        assert_eq!(report["valid"], false);
        assert_eq!(report["errors"][0]["kind"], "dangling_reference");
    }

    #[test]
    fn test_invalid_json_is_error() {
        let input = c("{ not json");
        let (result, error) = take(unsafe { exdef_normalize(input.as_ptr(), false) });
        assert!(result.is_none());
        assert!(error.unwrap().starts_with("invalid definition JSON"));
    }

    #[test]
    fn test_null_input_is_error() {
        let (result, error) = take(unsafe { exdef_fingerprint(std::ptr::null()) });
        assert!(result.is_none());
        assert_eq!(error.unwrap(), "null or invalid UTF-8 definition");
    }

    #[test]
    fn test_free_null_is_noop() {
        unsafe { exdef_free_string(std::ptr::null_mut()) };
    }
}
