use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Prompt labels for the profile fields, in the order they are asked for.
pub const FIELD_LABELS: [&str; 5] = ["API Key", "API Secret", "FQDN", "Port", "Org ID"];

pub const PROFILE_NAME_LABEL: &str = "Profile Name";

/// Credentials and coordinates for one management endpoint.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default, rename = "fqdn")]
    pub hostname: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub org_id: String,
}

impl fmt::Debug for ProfileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileInfo")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("org_id", &self.org_id)
            .finish()
    }
}

impl ProfileInfo {
    /// Mutable access to each field paired with its prompt label.
    pub fn fields_mut(&mut self) -> [(&'static str, &mut String); 5] {
        [
            (FIELD_LABELS[0], &mut self.api_key),
            (FIELD_LABELS[1], &mut self.api_secret),
            (FIELD_LABELS[2], &mut self.hostname),
            (FIELD_LABELS[3], &mut self.port),
            (FIELD_LABELS[4], &mut self.org_id),
        ]
    }

    pub fn is_complete(&self) -> bool {
        [
            &self.api_key,
            &self.api_secret,
            &self.hostname,
            &self.port,
            &self.org_id,
        ]
        .iter()
        .all(|v| !v.is_empty())
    }

    /// Root of the versioned REST API, e.g. `https://pce.example.com:8443/api/v2/`.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let port: u16 = self
            .port
            .parse()
            .map_err(|_| ConfigError::InvalidEndpoint(format!("port '{}' is not a number", self.port)))?;

        Url::parse(&format!("https://{}:{}/api/v2/", self.hostname, port))
            .map_err(|e| ConfigError::InvalidEndpoint(format!("{}: {}", self.hostname, e)))
    }

    /// URL of an org-scoped resource, e.g. `org_url("labels")`.
    pub fn org_url(&self, path: &str) -> Result<Url, ConfigError> {
        let relative = format!("orgs/{}/{}", self.org_id, path.trim_start_matches('/'));
        self.base_url()?
            .join(&relative)
            .map_err(|e| ConfigError::InvalidEndpoint(format!("{}: {}", relative, e)))
    }
}

/// Persisted state: named profiles plus the default pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub default_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileInfo>,
}

impl Configuration {
    /// A configuration holding a single profile that is also the default.
    pub fn with_profile(name: &str, profile: ProfileInfo) -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(name.to_string(), profile);
        Self {
            default_profile: name.to_string(),
            profiles,
        }
    }

    /// True when the default pointer names an existing profile.
    pub fn has_default(&self) -> bool {
        !self.default_profile.is_empty() && self.profiles.contains_key(&self.default_profile)
    }

    pub fn needs_repair(&self) -> bool {
        self.profiles.is_empty() || !self.has_default()
    }

    /// Look up a profile by name, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &ProfileInfo), ConfigError> {
        match name {
            Some(label) => self
                .profiles
                .get_key_value(label)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| ConfigError::ProfileNotFound(label.to_string())),
            None => {
                if !self.has_default() {
                    return Err(ConfigError::NoDefaultProfile);
                }
                self.profile(Some(&self.default_profile))
            }
        }
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.profiles.contains_key(name) {
            return Err(ConfigError::ProfileNotFound(name.to_string()));
        }
        self.default_profile = name.to_string();
        Ok(())
    }
}
