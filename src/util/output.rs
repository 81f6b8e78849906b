#![allow(clippy::print_stdout)]

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::sync::Mutex;

/* When --json is given, actions record key/value pairs here instead of
 * printing lines, and main prints the whole object once at the end. */
static JSON_FIELDS: Mutex<Option<Map<String, Value>>> = Mutex::new(None);

pub fn enable_json_output() {
    let mut fields = JSON_FIELDS.lock().expect("Failed to lock JSON_FIELDS");
    if fields.is_none() {
        *fields = Some(Map::new());
    }
}

pub fn json_output_enabled() -> bool {
    JSON_FIELDS
        .lock()
        .expect("Failed to lock JSON_FIELDS")
        .is_some()
}

pub fn print_output(printed_output: &str) {
    if !json_output_enabled() {
        println!("{}", printed_output);
    }
}

/// Records a field for the JSON object. A no-op unless JSON output is on.
pub fn set_json_output(key: &str, value: Value) {
    if let Some(fields) = JSON_FIELDS
        .lock()
        .expect("Failed to lock JSON_FIELDS")
        .as_mut()
    {
        fields.insert(key.to_string(), value);
    }
}

#[macro_export]
macro_rules! outln {
    ( $fmt:expr $(, $args:expr)*) => {
        $crate::util::print_output(&format!($fmt $(, $args)*))
    };
}

pub fn print_json_output() -> Result<()> {
    let fields = JSON_FIELDS
        .lock()
        .expect("Failed to lock JSON_FIELDS")
        .clone()
        .unwrap_or_default();
    println!(
        "{}",
        serde_json::to_string_pretty(&Value::Object(fields))
            .context("Error serializing JSON")?
    );
    Ok(())
}
