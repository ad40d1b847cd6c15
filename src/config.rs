//! Settings file handling.
//!
//! Settings are produced by hand (or the `--setup` template) as a JSON file
//! and treated as read-only for the life of a run. Validation happens once at
//! load so the processing path never re-checks structural invariants.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::mapping::{MappingEntry, MappingTable};

/// Where generated configuration lands: the ztp CLI or an external CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeystoreMode {
    Cli,
    Csv,
}

/// Which submissions get marked read once a batch completes.
///
/// `Always` marks every fetched submission regardless of per-submission or
/// execution outcome. `OnSuccess` marks only submissions that resolved an
/// identity, and skips marking entirely when command execution does not
/// report a running service. The upstream behavior was never decided, so it
/// stays a policy knob rather than a fixed choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkReadPolicy {
    #[default]
    Always,
    OnSuccess,
}

/// Process-wide settings, loaded once per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub api_key: String,
    pub form_id: String,
    /// Single character packing multiple logical values into one answer.
    pub delimiter: char,
    /// Sentinel answer meaning "no real answer was given".
    pub null_answer: String,
    pub keystore_type: KeystoreMode,
    /// External keystore path; required when `keystore_type` is `csv`.
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
    /// Create partial keystore rows for identities not already present.
    #[serde(default)]
    pub import_unknown: bool,
    #[serde(default)]
    pub mark_read: MarkReadPolicy,
    /// Webex bot credentials; both must be set for chat notifications.
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    /// Generic webhook endpoint for status notifications.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Variable name -> extraction recipe. Resolved via [`Settings::mapping`].
    pub data_map: BTreeMap<String, MappingEntry>,
}

impl Settings {
    /// Read and validate the settings file.
    pub fn load(path: &Path) -> Result<Settings> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read settings file {}; run --setup first", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("parse settings file {}", path.display()))?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "imported settings");
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.keystore_type == KeystoreMode::Csv && self.csv_path.is_none() {
            return Err(anyhow!("keystore_type is csv but csv_path is not set"));
        }
        // Surfaces a missing/duplicate keystore_id recipe at load time.
        self.mapping().map(|_| ())
    }

    /// Resolve `data_map` into its classified form.
    pub fn mapping(&self) -> Result<MappingTable> {
        MappingTable::resolve(&self.data_map)
    }
}

/// Write a fill-in-by-hand settings template. Refuses to clobber an existing
/// file.
pub fn write_template(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(anyhow!(
            "settings file {} already exists; edit it in place",
            path.display()
        ));
    }
    let mut data_map = BTreeMap::new();
    data_map.insert(
        "keystore_id".to_string(),
        MappingEntry {
            answer_id: "4".to_string(),
            sub_index: 0,
        },
    );
    data_map.insert(
        "idarray_1".to_string(),
        MappingEntry {
            answer_id: "5".to_string(),
            sub_index: 0,
        },
    );
    let template = Settings {
        api_key: "your-api-key".to_string(),
        form_id: "your-form-id".to_string(),
        delimiter: ':',
        null_answer: "Select From List".to_string(),
        keystore_type: KeystoreMode::Cli,
        csv_path: None,
        import_unknown: false,
        mark_read: MarkReadPolicy::Always,
        bot_token: None,
        room_id: None,
        webhook_url: None,
        data_map,
    };
    let json = serde_json::to_string_pretty(&template)?;
    std::fs::write(path, json)
        .with_context(|| format!("write settings template {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "api_key": "abc123",
            "form_id": "220000000000000",
            "delimiter": ":",
            "null_answer": "Select From List",
            "keystore_type": "cli",
            "import_unknown": false,
            "data_map": {
                "keystore_id": {"qID": "4", "index": 0},
                "idarray_1": {"qID": "4", "index": 1},
                "association": {"qID": "5", "index": 0},
                "vlan": {"qID": "6", "index": 0}
            }
        }"#
    }

    #[test]
    fn parse_and_resolve_sample_settings() {
        let settings: Settings = serde_json::from_str(sample_json()).unwrap();
        settings.validate().unwrap();
        assert_eq!(settings.delimiter, ':');
        assert_eq!(settings.keystore_type, KeystoreMode::Cli);
        assert_eq!(settings.mark_read, MarkReadPolicy::Always);

        let table = settings.mapping().unwrap();
        assert_eq!(table.keystore_id.answer_id, "4");
        assert_eq!(table.vars.len(), 3);
    }

    #[test]
    fn csv_mode_requires_path() {
        let mut settings: Settings = serde_json::from_str(sample_json()).unwrap();
        settings.keystore_type = KeystoreMode::Csv;
        assert!(settings.validate().is_err());
        settings.csv_path = Some(PathBuf::from("keystore.csv"));
        settings.validate().unwrap();
    }

    #[test]
    fn template_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datamap.json");
        write_template(&path).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.keystore_type, KeystoreMode::Cli);
        // Second write must not clobber the operator's file.
        assert!(write_template(&path).is_err());
    }
}
