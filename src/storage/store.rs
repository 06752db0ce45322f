use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::console::Console;
use super::types::*;
use crate::error::ConfigError;

/// Name given to the profile migrated out of a flat single-profile file.
pub const LEGACY_PROFILE_NAME: &str = "default";

const LEGACY_KEYS: [&str; 5] = ["api_key", "api_secret", "fqdn", "port", "org_id"];

/// Fields that may be written as bare JSON numbers.
const NUMERIC_KEYS: [&str; 2] = ["port", "org_id"];

/// What a configuration file decoded into.
#[derive(Debug, PartialEq, Eq)]
enum Decoded {
    Current(Configuration),
    Legacy(ProfileInfo),
}

/// Named-profile configuration backed by a single JSON file.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, creating or repairing it interactively when
    /// the file is missing or incomplete. Any creation or repair is persisted
    /// before returning.
    pub fn resolve(&self, console: &mut dyn Console) -> Result<Configuration, ConfigError> {
        let exists = self.path.try_exists().map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;

        if !exists {
            console.status("Configuration file not found, please provide the following details:");
            let (name, profile) = prompt_profile(console, &BTreeMap::new())?;
            let config = Configuration::with_profile(&name, profile);
            self.save(&config)?;
            console.status(&format!("Configuration saved to {}", self.path.display()));
            return Ok(config);
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;

        let (mut config, mut changed) = match decode(&contents) {
            Decoded::Current(config) => (config, false),
            Decoded::Legacy(profile) => {
                info!(path = %self.path.display(), "migrating single-profile configuration");
                (migrate_legacy(console, profile)?, true)
            }
        };

        for (name, profile) in config.profiles.iter_mut() {
            if !profile.is_complete() {
                console.status(&format!(
                    "Profile '{}' is missing details, please provide them:",
                    name
                ));
                fill_blank_fields(console, profile)?;
                changed = true;
            }
        }

        if config.needs_repair() {
            repair(console, &mut config)?;
            changed = true;
        }

        if changed {
            self.save(&config)?;
            console.status(&format!(
                "Updated and saved configuration to {}",
                self.path.display()
            ));
        } else {
            debug!(path = %self.path.display(), profiles = config.profiles.len(), "loaded configuration");
        }

        Ok(config)
    }

    /// Replace the backing file with `config`, then read it back to confirm
    /// the write landed intact.
    pub fn save(&self, config: &Configuration) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(config)?;
        let write_err = |source: io::Error| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(write_err)?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(contents.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        let written = fs::read_to_string(&self.path).map_err(write_err)?;
        if decode(&written) != Decoded::Current(config.clone()) {
            return Err(ConfigError::Verify {
                path: self.path.clone(),
            });
        }

        info!(path = %self.path.display(), "saved configuration");
        Ok(())
    }
}

// -- Decoding -----------------------------------------------------------------

/// Best-effort decode. Malformed content never fails: whatever cannot be
/// understood is left empty so the repair step can fill it in.
fn decode(contents: &str) -> Decoded {
    let root = match serde_json::from_str::<Value>(contents) {
        Ok(Value::Object(root)) => root,
        Ok(_) => {
            warn!("configuration root is not an object, ignoring its content");
            return Decoded::Current(Configuration::default());
        }
        Err(e) => {
            warn!(error = %e, "configuration file is not valid JSON, ignoring its content");
            return Decoded::Current(Configuration::default());
        }
    };

    if !root.contains_key("profiles") && LEGACY_KEYS.iter().any(|k| root.contains_key(*k)) {
        return Decoded::Legacy(decode_profile("<legacy>", &root));
    }

    let default_profile = text_field(&root, "default_profile", "<root>");

    let mut profiles = BTreeMap::new();
    match root.get("profiles") {
        Some(Value::Object(entries)) => {
            for (name, entry) in entries {
                match entry {
                    Value::Object(fields) => {
                        profiles.insert(name.clone(), decode_profile(name, fields));
                    }
                    _ => warn!(profile = %name, "profile entry is not an object, skipping"),
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => warn!("'profiles' is not an object, ignoring it"),
    }

    Decoded::Current(Configuration {
        default_profile,
        profiles,
    })
}

fn decode_profile(name: &str, fields: &Map<String, Value>) -> ProfileInfo {
    ProfileInfo {
        api_key: text_field(fields, "api_key", name),
        api_secret: text_field(fields, "api_secret", name),
        hostname: text_field(fields, "fqdn", name),
        port: text_field(fields, "port", name),
        org_id: text_field(fields, "org_id", name),
    }
}

fn text_field(fields: &Map<String, Value>, key: &str, owner: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if NUMERIC_KEYS.contains(&key) => n.to_string(),
        Some(Value::Null) | None => String::new(),
        Some(_) => {
            warn!(owner, field = key, "field has unexpected type, treating it as empty");
            String::new()
        }
    }
}

// -- Interactive fill-in ------------------------------------------------------

/// Read one non-empty, trimmed value. Blank answers are asked again.
fn ask(console: &mut dyn Console, label: &str) -> Result<String, ConfigError> {
    loop {
        let line = console
            .prompt(label)?
            .ok_or_else(|| ConfigError::InputClosed(label.to_string()))?;
        let value = line.trim();
        if !value.is_empty() {
            return Ok(value.to_string());
        }
        debug!(field = label, "blank answer, asking again");
    }
}

/// Prompt for the five profile fields followed by a name not already taken.
fn prompt_profile(
    console: &mut dyn Console,
    existing: &BTreeMap<String, ProfileInfo>,
) -> Result<(String, ProfileInfo), ConfigError> {
    let mut profile = ProfileInfo::default();
    for (label, value) in profile.fields_mut() {
        *value = ask(console, label)?;
    }

    loop {
        let name = ask(console, PROFILE_NAME_LABEL)?;
        if !existing.contains_key(&name) {
            return Ok((name, profile));
        }
        console.status(&format!("Profile '{}' already exists, choose another name.", name));
    }
}

/// Prompt only for the fields of `profile` that are still empty.
fn fill_blank_fields(
    console: &mut dyn Console,
    profile: &mut ProfileInfo,
) -> Result<(), ConfigError> {
    for (label, value) in profile.fields_mut() {
        if value.is_empty() {
            *value = ask(console, label)?;
        }
    }
    Ok(())
}

fn migrate_legacy(
    console: &mut dyn Console,
    mut profile: ProfileInfo,
) -> Result<Configuration, ConfigError> {
    fill_blank_fields(console, &mut profile)?;
    Ok(Configuration::with_profile(LEGACY_PROFILE_NAME, profile))
}

/// Add one profile, leaving existing ones untouched. The new profile becomes
/// the default only when no valid default is set.
fn repair(console: &mut dyn Console, config: &mut Configuration) -> Result<(), ConfigError> {
    warn!(
        profiles = config.profiles.len(),
        default_profile = %config.default_profile,
        "configuration incomplete, adding a profile"
    );
    console.status("Configuration is incomplete, please add a profile:");

    let (name, profile) = prompt_profile(console, &config.profiles)?;
    config.profiles.insert(name.clone(), profile);
    if !config.has_default() {
        config.default_profile = name;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::console::LineConsole;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn console(lines: &[&str]) -> LineConsole<Cursor<String>, Vec<u8>> {
        let mut input = lines.join("\n");
        input.push('\n');
        LineConsole::new(Cursor::new(input), Vec::new())
    }

    fn output(console: LineConsole<Cursor<String>, Vec<u8>>) -> String {
        String::from_utf8(console.into_writer()).unwrap()
    }

    fn profile(key: &str) -> ProfileInfo {
        ProfileInfo {
            api_key: key.to_string(),
            api_secret: "secret".to_string(),
            hostname: "pce.example.com".to_string(),
            port: "8443".to_string(),
            org_id: "1".to_string(),
        }
    }

    #[test]
    fn bootstrap_creates_single_default_profile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let store = ConfigStore::new(&path);
        let mut io = console(&["K1", "S1", "host.example.com", "443", "org1", "profileA"]);

        let config = store.resolve(&mut io).unwrap();

        let expected = Configuration::with_profile(
            "profileA",
            ProfileInfo {
                api_key: "K1".to_string(),
                api_secret: "S1".to_string(),
                hostname: "host.example.com".to_string(),
                port: "443".to_string(),
                org_id: "org1".to_string(),
            },
        );
        assert_eq!(config, expected);
        assert!(path.exists());

        let on_disk: Configuration =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, expected);

        let out = output(io);
        assert!(out.contains("Configuration file not found"));
        assert!(out.contains("Configuration saved to"));
        assert!(!out.contains("Updated and saved"));
    }

    #[test]
    fn second_resolve_is_silent_and_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let store = ConfigStore::new(&path);

        let first = store
            .resolve(&mut console(&["K1", "S1", "h", "443", "o", "p"]))
            .unwrap();
        let bytes_before = fs::read(&path).unwrap();

        let mut io = console(&[]);
        let second = store.resolve(&mut io).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(&path).unwrap(), bytes_before);
        assert_eq!(output(io), "");
    }

    #[test]
    fn prompted_values_are_trimmed() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("cfg.json"));
        let mut io = console(&["  abc123\r", "\tS1 ", "h ", " 443", "o", " p "]);

        let config = store.resolve(&mut io).unwrap();
        let (name, p) = config.profile(None).unwrap();
        assert_eq!(name, "p");
        assert_eq!(p.api_key, "abc123");
        assert_eq!(p.api_secret, "S1");
        assert_eq!(p.hostname, "h");
        assert_eq!(p.port, "443");
    }

    #[test]
    fn blank_answers_are_asked_again() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("cfg.json"));
        let mut io = console(&["", "   ", "K1", "S1", "h", "443", "o", "p"]);

        let config = store.resolve(&mut io).unwrap();
        assert_eq!(config.profiles["p"].api_key, "K1");
        assert_eq!(output(io).matches("API Key: ").count(), 3);
    }

    #[test]
    fn closed_input_aborts_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let store = ConfigStore::new(&path);

        let err = store.resolve(&mut console(&["K1", "S1"])).unwrap_err();
        assert!(matches!(err, ConfigError::InputClosed(ref label) if label == "FQDN"));
        assert!(!path.exists());
    }

    #[test]
    fn empty_profiles_are_repaired() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"default_profile": "", "profiles": {}}"#).unwrap();
        let store = ConfigStore::new(&path);
        let mut io = console(&["K", "S", "h", "443", "o", "lab"]);

        let config = store.resolve(&mut io).unwrap();

        assert_eq!(config.default_profile, "lab");
        assert!(config.profiles.contains_key("lab"));
        assert!(output(io).contains("Updated and saved configuration to"));

        let reloaded = store.resolve(&mut console(&[])).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn repair_keeps_existing_profiles_and_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut existing = Configuration::with_profile("prod", profile("P"));
        existing.profiles.insert("lab".to_string(), profile("L"));
        existing.default_profile = "missing".to_string();
        fs::write(&path, serde_json::to_string_pretty(&existing).unwrap()).unwrap();

        let store = ConfigStore::new(&path);
        let config = store
            .resolve(&mut console(&["N", "S", "h", "443", "o", "new"]))
            .unwrap();

        assert_eq!(config.profiles.len(), 3);
        assert_eq!(config.profiles["prod"], profile("P"));
        assert_eq!(config.profiles["lab"], profile("L"));
        assert_eq!(config.default_profile, "new");
    }

    #[test]
    fn repair_does_not_move_a_valid_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut existing = Configuration::with_profile("prod", profile("P"));
        existing.profiles.clear();
        existing.default_profile = "prod".to_string();
        fs::write(&path, serde_json::to_string(&existing).unwrap()).unwrap();

        let config = ConfigStore::new(&path)
            .resolve(&mut console(&["K", "S", "h", "443", "o", "prod"]))
            .unwrap();

        assert_eq!(config.default_profile, "prod");
        assert_eq!(config.profiles["prod"].api_key, "K");
    }

    #[test]
    fn repair_refuses_existing_profile_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut existing = Configuration::with_profile("prod", profile("P"));
        existing.default_profile.clear();
        fs::write(&path, serde_json::to_string(&existing).unwrap()).unwrap();

        let mut io = console(&["N", "S", "h", "443", "o", "prod", "lab"]);
        let config = ConfigStore::new(&path).resolve(&mut io).unwrap();

        assert_eq!(config.profiles["prod"], profile("P"));
        assert_eq!(config.profiles["lab"].api_key, "N");
        assert_eq!(config.default_profile, "lab");
        assert!(output(io).contains("Profile 'prod' already exists"));
    }

    #[test]
    fn malformed_file_degrades_to_repair() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, "{ not json").unwrap();

        let config = ConfigStore::new(&path)
            .resolve(&mut console(&["K", "S", "h", "443", "o", "p"]))
            .unwrap();

        assert_eq!(config.default_profile, "p");
        let on_disk: Configuration =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, config);
    }

    #[test]
    fn mistyped_fields_are_left_empty() {
        let contents = r#"{
            "default_profile": 7,
            "profiles": {
                "prod": {"api_key": "K", "api_secret": true, "fqdn": "h", "port": 8443, "org_id": 1},
                "junk": "nope"
            }
        }"#;
        let Decoded::Current(config) = decode(contents) else {
            panic!("expected multi-profile shape");
        };

        assert_eq!(config.default_profile, "");
        assert_eq!(config.profiles.len(), 1);
        let prod = &config.profiles["prod"];
        assert_eq!(prod.api_key, "K");
        assert_eq!(prod.api_secret, "");
        assert_eq!(prod.port, "8443");
        assert_eq!(prod.org_id, "1");
    }

    #[test]
    fn numeric_default_profile_is_left_empty() {
        let Decoded::Current(config) = decode(r#"{"default_profile": 7, "profiles": {}}"#) else {
            panic!("expected multi-profile shape");
        };
        assert_eq!(config.default_profile, "");
    }

    #[test]
    fn blank_fields_of_stored_profile_are_filled_before_repair() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"default_profile": "", "profiles": {"prod": {"api_key": "K"}}}"#)
            .unwrap();

        let mut io = console(&["S", "h", "443", "1", "N", "S2", "h2", "8443", "2", "lab"]);
        let config = ConfigStore::new(&path).resolve(&mut io).unwrap();

        let prod = &config.profiles["prod"];
        assert_eq!(prod.api_key, "K");
        assert_eq!(prod.api_secret, "S");
        assert_eq!(prod.hostname, "h");
        assert!(prod.is_complete());
        assert!(config.profiles["lab"].is_complete());
        assert_eq!(config.default_profile, "lab");

        let on_disk: Configuration =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(on_disk.profiles.values().all(ProfileInfo::is_complete));
        assert!(output(io).contains("Profile 'prod' is missing details"));
    }

    #[test]
    fn incomplete_default_profile_is_filled_and_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(
            &path,
            r#"{"default_profile": "prod", "profiles": {"prod": {"api_key": "K", "port": ""}}}"#,
        )
        .unwrap();

        let mut io = console(&["S", "h", "443", "1"]);
        let config = ConfigStore::new(&path).resolve(&mut io).unwrap();

        let (name, prod) = config.profile(None).unwrap();
        assert_eq!(name, "prod");
        assert_eq!(prod.api_key, "K");
        assert_eq!(prod.api_secret, "S");
        assert_eq!(prod.hostname, "h");
        assert_eq!(prod.port, "443");
        assert_eq!(prod.org_id, "1");

        let out = output(io);
        assert!(!out.contains("API Key: "));
        assert!(!out.contains(PROFILE_NAME_LABEL));
        assert!(out.contains("Updated and saved configuration to"));

        let reloaded = ConfigStore::new(&path).resolve(&mut console(&[])).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn legacy_file_is_migrated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(
            &path,
            r#"{"api_key": "K", "api_secret": "S", "fqdn": "h", "port": "443", "org_id": "1"}"#,
        )
        .unwrap();

        let mut io = console(&[]);
        let config = ConfigStore::new(&path).resolve(&mut io).unwrap();

        assert_eq!(config.default_profile, LEGACY_PROFILE_NAME);
        assert_eq!(config.profiles[LEGACY_PROFILE_NAME].hostname, "h");
        assert!(output(io).contains("Updated and saved configuration to"));

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("\"profiles\""));
    }

    #[test]
    fn legacy_migration_fills_only_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"api_key": "K", "api_secret": "", "fqdn": "h"}"#).unwrap();

        let mut io = console(&["S", "443", "1"]);
        let config = ConfigStore::new(&path).resolve(&mut io).unwrap();

        let p = &config.profiles[LEGACY_PROFILE_NAME];
        assert_eq!(p.api_key, "K");
        assert_eq!(p.api_secret, "S");
        assert_eq!(p.port, "443");
        assert_eq!(p.org_id, "1");
        assert!(p.is_complete());

        let out = output(io);
        assert!(!out.contains("API Key: "));
        assert!(!out.contains(PROFILE_NAME_LABEL));
    }

    #[test]
    fn unreadable_file_fails_before_prompting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::create_dir(&path).unwrap();

        let mut io = console(&["K", "S", "h", "443", "o", "p"]);
        let err = ConfigStore::new(&path).resolve(&mut io).unwrap_err();

        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(output(io), "");
    }

    #[test]
    fn save_reports_write_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let store = ConfigStore::new(blocker.join("cfg.json"));
        let err = store
            .save(&Configuration::with_profile("p", profile("K")))
            .unwrap_err();

        assert!(matches!(err, ConfigError::Write { .. }));
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("cfg.json");
        let config = Configuration::with_profile("p", profile("K"));

        ConfigStore::new(&path).save(&config).unwrap();

        let on_disk: Configuration =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, config);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        ConfigStore::new(&path)
            .save(&Configuration::with_profile("p", profile("K")))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
