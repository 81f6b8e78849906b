use super::structs::Config;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

pub const CONFIG_KEYS: [&str; 8] = [
    "log_level",
    "data_dir",
    "image_url",
    "image_sha256",
    "arch",
    "assets_dir",
    "host_storage",
    "log_file",
];

impl Config {
    /// Value of a config key as JSON, `None` for keys we don't know
    pub fn get(&self, key: &str) -> Option<Value> {
        let path = |p: &std::path::Path| Value::String(p.display().to_string());
        let value = match key {
            "log_level" => Value::String(self.log_level.to_string()),
            "data_dir" => path(&self.data_dir),
            "image_url" => Value::String(self.image_url.clone()),
            "image_sha256" => self
                .image_sha256
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            "arch" => Value::String(self.arch.clone()),
            "assets_dir" => path(&self.assets_dir),
            "host_storage" => path(&self.host_storage),
            "log_file" => {
                self.log_file.as_deref().map(path).unwrap_or(Value::Null)
            }
            _ => return None,
        };
        Some(value)
    }
}

pub(crate) fn deserialize_level_filter<'de, D>(
    deserializer: D,
) -> Result<Option<log::LevelFilter>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map_or(Ok(None), |s| {
        log::LevelFilter::from_str(&s)
            .map(Some)
            .map_err(serde::de::Error::custom)
    })
}
