#![allow(clippy::option_map_unit_fn)]
use crate::config::{CONFIG_KEYS, Config};
use crate::outln;
use crate::util::set_json_output;
use anyhow::Result;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

pub fn config(config: &Config, keys: Option<Vec<String>>) -> Result<()> {
    let keys =
        keys.unwrap_or_else(|| CONFIG_KEYS.map(String::from).to_vec());
    let multi_line = keys.len() > 1;

    for key in keys {
        let key = key.replace('-', "_");
        let Some(value) = config.get(&key) else {
            return Err(anyhow::anyhow!("Unknown key: {}", key));
        };
        print_config_line(&key, value, multi_line, &config.sources);
    }

    Ok(())
}

fn print_config_line(
    key: &str,
    value: Value,
    multi_line: bool,
    sources: &HashMap<String, String>,
) {
    let text = match &value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    sources.get(key).map(|s| {
        debug!("{}={} set from {}", key, text, s);
    });
    set_json_output(key, value);

    if multi_line {
        outln!("{}={}", key, text);
    } else {
        outln!("{}", text);
    }
}
