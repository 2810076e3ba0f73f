//! JS <-> record and key conversion
//!
//! Records cross into IndexedDB as plain JS objects built from their JSON
//! text, so whatever `serde_json::Value` holds is exactly what the
//! structured clone stores.

use idbridge_core::Key;
use serde_json::Value;
use wasm_bindgen::JsValue;

use crate::error::{IndexedDbError, Result};

/// Convert a record into a JS value for storage.
pub fn value_to_js(value: &Value) -> Result<JsValue> {
    let json = serde_json::to_string(value)?;
    js_sys::JSON::parse(&json).map_err(|e| IndexedDbError::JsValue(format!("{:?}", e)))
}

/// Convert a stored JS value back into a record.
pub fn js_to_value(val: &JsValue) -> Result<Value> {
    if val.is_undefined() {
        return Ok(Value::Null);
    }
    let json = js_sys::JSON::stringify(val)
        .map_err(|e| IndexedDbError::JsValue(format!("{:?}", e)))?;
    Ok(serde_json::from_str(&String::from(json))?)
}

/// Convert a key into its JS form (number, string or array).
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

/// Convert a key returned by the engine.
pub fn js_to_key(val: &JsValue) -> Result<Key> {
    let value = js_to_value(val)?;
    Key::from_value(&value)
        .ok_or_else(|| IndexedDbError::Data(format!("engine returned a non-key value: {}", value)))
}
