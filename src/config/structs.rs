use super::impls::deserialize_level_filter;
use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf};

pub const DEFAULT_IMAGE_URL: &str = "https://dl-cdn.alpinelinux.org/alpine/v3.20/releases/aarch64/alpine-minirootfs-3.20.3-aarch64.tar.gz";

pub const DEFAULT_HOST_STORAGE: &str = "/sdcard";

#[derive(Deserialize, Default, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(deserialize_with = "deserialize_level_filter", default)]
    pub log_level: Option<log::LevelFilter>,
    pub data_dir: Option<String>,
    pub image_url: Option<String>,
    pub image_sha256: Option<String>,
    pub arch: Option<String>,
    pub assets_dir: Option<String>,
    pub host_storage: Option<String>,
    pub log_file: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: log::LevelFilter,
    pub data_dir: PathBuf,
    pub image_url: String,
    pub image_sha256: Option<String>,
    pub arch: String,
    pub assets_dir: PathBuf,
    pub host_storage: PathBuf,
    pub log_file: Option<PathBuf>,
    pub sources: HashMap<String, String>,
}
