use super::cli::Args;
use super::{Config, DEFAULT_HOST_STORAGE, DEFAULT_IMAGE_URL, PartialConfig};
use crate::util::resolve_home;
use anyhow::{Context, Result, anyhow};
use log::trace;
use nix::unistd::{AccessFlags, access};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{env, str::FromStr};

pub fn resolve_config(cli: Args) -> Result<Config> {
    let home = resolve_home()?;
    let cwd = env::current_dir().context("Failed to get current directory")?;
    let (mut partial_config, mut sources) = load_partial(cli.no_config)?;

    // Override with environment variables if set
    if let Ok(log_level) = env::var("PROOTENV_LOG_LEVEL") {
        if let Ok(log_level) = log::LevelFilter::from_str(&log_level) {
            partial_config.log_level = Some(log_level);
            sources.insert("log_level".into(), "environment".into());
        } else {
            return Err(anyhow!("Invalid log level: {}", log_level));
        }
    }
    let env_overrides: [(&str, &str, &mut Option<String>); 7] = [
        ("data_dir", "PROOTENV_DATA_DIR", &mut partial_config.data_dir),
        ("image_url", "PROOTENV_IMAGE_URL", &mut partial_config.image_url),
        (
            "image_sha256",
            "PROOTENV_IMAGE_SHA256",
            &mut partial_config.image_sha256,
        ),
        ("arch", "PROOTENV_ARCH", &mut partial_config.arch),
        ("assets_dir", "PROOTENV_ASSETS_DIR", &mut partial_config.assets_dir),
        (
            "host_storage",
            "PROOTENV_HOST_STORAGE",
            &mut partial_config.host_storage,
        ),
        ("log_file", "PROOTENV_LOG_FILE", &mut partial_config.log_file),
    ];
    for (key, var, slot) in env_overrides {
        if let Ok(value) = env::var(var) {
            if !value.is_empty() {
                *slot = Some(value);
                sources.insert(key.into(), "environment".into());
            }
        }
    }

    // Override with CLI args if provided (highest precedence)
    if let Some(log_level) = cli.log_level {
        partial_config.log_level = Some(log_level);
        sources.insert("log_level".into(), "cli".into());
    }
    let cli_overrides: [(&str, Option<String>, &mut Option<String>); 7] = [
        ("data_dir", cli.data_dir, &mut partial_config.data_dir),
        ("image_url", cli.image_url, &mut partial_config.image_url),
        ("image_sha256", cli.image_sha256, &mut partial_config.image_sha256),
        ("arch", cli.arch, &mut partial_config.arch),
        ("assets_dir", cli.assets_dir, &mut partial_config.assets_dir),
        ("host_storage", cli.host_storage, &mut partial_config.host_storage),
        ("log_file", cli.log_file, &mut partial_config.log_file),
    ];
    for (key, value, slot) in cli_overrides {
        if let Some(value) = value {
            *slot = Some(value);
            sources.insert(key.into(), "cli".into());
        }
    }

    // If nothing else, fill in with some default values
    let data_dir = match partial_config.data_dir {
        Some(data_dir) => absolute_path(&data_dir, &home, &cwd),
        None => default_data_dir(&home),
    };
    let assets_dir = match partial_config.assets_dir {
        Some(assets_dir) => absolute_path(&assets_dir, &home, &cwd),
        None => {
            sources.insert("assets_dir".into(), "derived from data_dir".into());
            data_dir.join("assets")
        }
    };
    let host_storage = absolute_path(
        partial_config
            .host_storage
            .as_deref()
            .unwrap_or(DEFAULT_HOST_STORAGE),
        &home,
        &cwd,
    );
    let log_file = partial_config
        .log_file
        .map(|log_file| absolute_path(&log_file, &home, &cwd));
    let image_sha256 = partial_config.image_sha256.map(|s| s.to_lowercase());

    for key in super::CONFIG_KEYS {
        if !sources.contains_key(key) {
            sources.insert(key.into(), "default".into());
        }
    }

    let config = Config {
        log_level: partial_config.log_level.unwrap_or(log::LevelFilter::Info),
        data_dir,
        image_url: partial_config
            .image_url
            .unwrap_or(DEFAULT_IMAGE_URL.to_string()),
        image_sha256,
        arch: partial_config
            .arch
            .unwrap_or(env::consts::ARCH.to_string()),
        assets_dir,
        host_storage,
        log_file,
        sources,
    };

    validate_config(&config)?;

    trace!("Data dir: {:?}", config.data_dir);
    trace!("Image: {:?}", config.image_url);

    Ok(config)
}

fn default_data_dir(home: &Path) -> PathBuf {
    match env::var("XDG_DATA_HOME") {
        Ok(xdg) if Path::new(&xdg).is_absolute() => {
            PathBuf::from(xdg).join("prootenv")
        }
        _ => home.join(".local/share/prootenv"),
    }
}

/* proot is given these paths verbatim, so they have to be absolute */
fn absolute_path(path: &str, home: &Path, cwd: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        cwd.join(path)
    }
}

pub fn load_partial(
    no_config: bool,
) -> Result<(PartialConfig, HashMap<String, String>)> {
    let config_paths = if no_config {
        vec![]
    } else {
        find_config_files()?
    };
    let mut sources = HashMap::new();
    if config_paths.is_empty() {
        trace!("No config files found, using default config");
        return Ok((PartialConfig::default(), sources));
    }

    let mut merged_config = PartialConfig::default();
    for path in config_paths.iter() {
        let config = load_config_file(path)?;
        merge_configs(
            &mut merged_config,
            &mut sources,
            config,
            path.to_str()
                .context("Failed to convert config path to str")?,
        );
        trace!("Loaded config file: {}", path.display());
    }

    Ok((merged_config, sources))
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    let config_str = std::fs::read_to_string(path)
        .context(format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&config_str)
        .context(format!("Failed to parse config file {}", path.display()))
}

/** Returns all readable config files, lowest precedence first */
fn find_config_files() -> Result<Vec<PathBuf>> {
    let home = resolve_home()?;
    let mut paths_to_check = Vec::new();

    // Any project specific files, nearest first
    let mut current_dir = std::env::current_dir()?;
    loop {
        paths_to_check.push(current_dir.join(".prootenv.toml"));
        if !current_dir.pop() {
            break;
        }
    }

    paths_to_check.push(home.join(".config/prootenv/config.toml"));
    paths_to_check.push(PathBuf::from("/etc/prootenv.toml"));

    // Finally reverse them so we can process them in order nicely
    paths_to_check.reverse();

    Ok(paths_to_check
        .into_iter()
        .filter(|path| path.is_file() && access(path, AccessFlags::R_OK).is_ok())
        .collect())
}

fn merge_configs(
    base: &mut PartialConfig,
    sources: &mut HashMap<String, String>,
    override_config: PartialConfig,
    source: &str,
) {
    if let Some(log_level) = override_config.log_level {
        base.log_level = Some(log_level);
        sources.insert("log_level".into(), source.into());
    }
    let overrides: [(&str, Option<String>, &mut Option<String>); 7] = [
        ("data_dir", override_config.data_dir, &mut base.data_dir),
        ("image_url", override_config.image_url, &mut base.image_url),
        (
            "image_sha256",
            override_config.image_sha256,
            &mut base.image_sha256,
        ),
        ("arch", override_config.arch, &mut base.arch),
        ("assets_dir", override_config.assets_dir, &mut base.assets_dir),
        (
            "host_storage",
            override_config.host_storage,
            &mut base.host_storage,
        ),
        ("log_file", override_config.log_file, &mut base.log_file),
    ];
    for (key, value, slot) in overrides {
        if let Some(value) = value {
            *slot = Some(value);
            sources.insert(key.into(), source.into());
        }
    }
}

fn validate_config(config: &Config) -> Result<()> {
    if let Some(digest) = &config.image_sha256 {
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(anyhow!(
                "Invalid image_sha256, expected 64 hex characters: {}",
                digest
            ));
        }
    }
    if config.image_url.is_empty() {
        return Err(anyhow!("image_url must not be empty"));
    }
    Ok(())
}
