//! JS <-> record/key conversion
//!
//! Records cross the boundary as JSON so that every field round-trips with
//! the same shape serde_json gives it. Keys are converted structurally:
//! numbers, strings and arrays of keys.

use objectstore_core::{EngineError, Key, Record};
use wasm_bindgen::JsValue;

use crate::error::engine_error;

/// Convert a record to a JS object for storage.
pub fn record_to_js(record: &Record) -> Result<JsValue, EngineError> {
    let json = serde_json::to_string(record).map_err(|e| EngineError::data(e.to_string()))?;
    js_sys::JSON::parse(&json).map_err(engine_error)
}

/// Convert a JS object read from IndexedDB back to a record.
pub fn js_to_record(val: &JsValue) -> Result<Record, EngineError> {
    let json: String = js_sys::JSON::stringify(val)
        .map(String::from)
        .map_err(engine_error)?;
    serde_json::from_str(&json)
        .map_err(|e| EngineError::data(format!("stored value is not a record: {}", e)))
}

/// Convert a key to its JS representation.
pub fn key_to_js(key: &Key) -> JsValue {
    match key {
        Key::Number(n) => JsValue::from_f64(*n),
        Key::String(s) => JsValue::from_str(s),
        Key::Array(items) => {
            let array = js_sys::Array::new_with_length(items.len() as u32);
            for (i, item) in items.iter().enumerate() {
                array.set(i as u32, key_to_js(item));
            }
            array.into()
        }
    }
}

/// Convert a JS key (as returned by `put`) back to a key.
pub fn js_to_key(val: &JsValue) -> Result<Key, EngineError> {
    if let Some(n) = val.as_f64() {
        return Ok(Key::number(n));
    }
    if let Some(s) = val.as_string() {
        return Ok(Key::String(s));
    }
    if js_sys::Array::is_array(val) {
        let array = js_sys::Array::from(val);
        let mut items = Vec::with_capacity(array.length() as usize);
        for i in 0..array.length() {
            items.push(js_to_key(&array.get(i))?);
        }
        return Ok(Key::Array(items));
    }
    Err(EngineError::data(format!("unsupported key type: {:?}", val)))
}

/// Convert a JS array of stored values into records.
pub fn js_array_to_records(val: &JsValue) -> Result<Vec<Record>, EngineError> {
    let array = js_sys::Array::from(val);
    let mut records = Vec::with_capacity(array.length() as usize);
    for i in 0..array.length() {
        records.push(js_to_record(&array.get(i))?);
    }
    Ok(records)
}
