use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::{self, CallRequest};
use crate::storage::{ConfigStore, Configuration, LineConsole};

const CONFIG_DIR: &str = "pcekit";
const CONFIG_FILE: &str = "pce.json";

pub fn default_config_path() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Could not determine config directory")?
        .join(CONFIG_DIR)
        .join(CONFIG_FILE))
}

fn open_store(config_path: Option<&Path>) -> Result<ConfigStore> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    Ok(ConfigStore::new(path))
}

fn resolve(store: &ConfigStore) -> Result<Configuration> {
    let mut console = LineConsole::stdio();
    store
        .resolve(&mut console)
        .with_context(|| format!("Failed to load configuration from {}", store.path().display()))
}

pub fn cmd_profiles(config_path: Option<&Path>) -> Result<()> {
    let store = open_store(config_path)?;
    let config = resolve(&store)?;

    for (name, profile) in &config.profiles {
        let marker = if *name == config.default_profile { " *" } else { "" };
        println!(
            "{}{} ({}:{}, org {})",
            name, marker, profile.hostname, profile.port, profile.org_id
        );
    }

    Ok(())
}

pub fn cmd_default(config_path: Option<&Path>, name: &str) -> Result<()> {
    let store = open_store(config_path)?;
    let mut config = resolve(&store)?;

    config.set_default(name)?;
    store.save(&config)?;

    eprintln!("Default profile set to '{}'.", name);
    Ok(())
}

pub struct CallArgs<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub profile: Option<&'a str>,
    pub data: Option<&'a str>,
    pub insecure: bool,
    /// Seconds; `Some(0)` disables the deadline.
    pub timeout_secs: Option<u64>,
    pub global: bool,
}

pub fn cmd_call(config_path: Option<&Path>, args: &CallArgs<'_>) -> Result<()> {
    let store = open_store(config_path)?;
    let config = resolve(&store)?;
    let (profile_name, profile) = config.profile(args.profile)?;

    let url = if args.path.starts_with("https://") || args.path.starts_with("http://") {
        args.path.to_string()
    } else if args.global {
        profile
            .base_url()?
            .join(args.path.trim_start_matches('/'))
            .with_context(|| format!("Invalid API path '{}'", args.path))?
            .to_string()
    } else {
        profile.org_url(args.path)?.to_string()
    };

    let timeout = match args.timeout_secs {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(api::DEFAULT_TIMEOUT),
    };

    let request = CallRequest::new(&url, args.method, &profile.api_key, &profile.api_secret)
        .body(args.data.unwrap_or_default())
        .insecure_tls(args.insecure)
        .timeout(timeout);

    let result = api::execute(&request)
        .with_context(|| format!("{} {} (profile '{}')", args.method, url, profile_name))?;

    eprintln!("HTTP {}", result.status);
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&result.body)?;
    if !result.body.ends_with(b"\n") && !result.body.is_empty() {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;

    if !result.is_success() {
        anyhow::bail!("{} {} returned HTTP {}", args.method, url, result.status);
    }
    Ok(())
}
