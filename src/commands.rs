//! Submission-to-CLI-command generation.
//!
//! Translates one submission's answers, through the resolved mapping table,
//! into an ordered list of `ztp` commands for a single device. Absent answers
//! actively clear prior state rather than leaving it untouched, so a
//! resubmission with a null answer removes a stale association or variable.

use crate::config::Settings;
use crate::extract;
use crate::forms::Submission;
use crate::mapping::{MappingTable, VarKind};

/// Commands generated for one device, plus its resolved identity.
#[derive(Debug, Clone)]
pub struct GeneratedCommands {
    pub commands: Vec<String>,
    pub keystore_id: String,
}

/// Generate provisioning commands for one submission.
///
/// Returns `None` when the submission's `keystore_id` cannot be resolved; the
/// submission is skipped whole rather than partially applied. Command order:
/// association/custom commands in mapping-table order, then exactly one
/// `ztp set idarray ...` carrying every resolved device id.
pub fn submission_to_cli(
    submission: &Submission,
    table: &MappingTable,
    settings: &Settings,
) -> Option<GeneratedCommands> {
    let Some(keystore_id) = extract::resolve(submission, &table.keystore_id, settings) else {
        tracing::error!(
            submission = %submission.id,
            "keystore_id could not be resolved; submission skipped"
        );
        return None;
    };
    tracing::info!(%keystore_id, "processing submission");

    let mut commands = Vec::new();
    let mut device_ids: Vec<(u32, String)> = Vec::new();

    for var in &table.vars {
        let value = extract::resolve(submission, &var.entry, settings);
        match &var.kind {
            VarKind::IdArray(slot) => {
                if let Some(device_id) = value {
                    tracing::debug!(slot, %device_id, "device id");
                    device_ids.push((*slot, device_id));
                }
            }
            VarKind::Association => match value {
                Some(template) => {
                    tracing::debug!(%template, "association");
                    commands.push(format!(
                        "ztp set association id {keystore_id} template {template}"
                    ));
                }
                None => commands.push(format!("ztp clear association {keystore_id}")),
            },
            VarKind::Custom(name) => match value {
                Some(data) => {
                    tracing::debug!(variable = %name, value = %data, "custom variable");
                    commands.push(format!("ztp set keystore {keystore_id} {name} {data}"));
                }
                None => commands.push(format!("ztp clear keystore {keystore_id} {name}")),
            },
            // The identity recipe is split out of `vars` at resolve time.
            VarKind::KeystoreId => {}
        }
    }

    // One idarray command per device, last, even when no ids resolved.
    device_ids.sort_by_key(|(slot, _)| *slot);
    let joined: Vec<&str> = device_ids.iter().map(|(_, id)| id.as_str()).collect();
    commands.push(format!("ztp set idarray {keystore_id} {}", joined.join(" ")));

    tracing::info!(%keystore_id, count = commands.len(), "finished parsing submission");
    Some(GeneratedCommands {
        commands,
        keystore_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeystoreMode, MarkReadPolicy};
    use crate::forms::Answer;
    use crate::mapping::MappingEntry;
    use std::collections::BTreeMap;

    fn settings(data_map: BTreeMap<String, MappingEntry>) -> Settings {
        Settings {
            api_key: "key".to_string(),
            form_id: "form".to_string(),
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
        }
    }

    fn entry(qid: &str, index: usize) -> MappingEntry {
        MappingEntry {
            answer_id: qid.to_string(),
            sub_index: index,
        }
    }

    fn answer(text: &str) -> Answer {
        Answer {
            text: String::new(),
            answer: Some(text.to_string()),
        }
    }

    fn sample_map() -> BTreeMap<String, MappingEntry> {
        let mut map = BTreeMap::new();
        map.insert("keystore_id".to_string(), entry("4", 0));
        map.insert("idarray_1".to_string(), entry("5", 0));
        map.insert("idarray_2".to_string(), entry("5", 1));
        map.insert("association".to_string(), entry("6", 0));
        map.insert("vlan".to_string(), entry("7", 0));
        map
    }

    fn sample_submission() -> Submission {
        let mut answers = BTreeMap::new();
        answers.insert("4".to_string(), answer("sw01"));
        answers.insert("5".to_string(), answer("FOC1111A : FOC2222B"));
        answers.insert("6".to_string(), answer("access-switch"));
        answers.insert("7".to_string(), answer("42"));
        Submission {
            id: "5300".to_string(),
            answers,
        }
    }

    #[test]
    fn idarray_command_is_last_and_space_joined() {
        let settings = settings(sample_map());
        let table = settings.mapping().unwrap();
        let generated = submission_to_cli(&sample_submission(), &table, &settings).unwrap();

        assert_eq!(generated.keystore_id, "sw01");
        let last = generated.commands.last().unwrap();
        assert_eq!(last, "ztp set idarray sw01 FOC1111A FOC2222B");
        assert!(generated
            .commands
            .contains(&"ztp set association id sw01 template access-switch".to_string()));
        assert!(generated
            .commands
            .contains(&"ztp set keystore sw01 vlan 42".to_string()));
    }

    #[test]
    fn absent_custom_variable_emits_clear() {
        let settings = settings(sample_map());
        let table = settings.mapping().unwrap();
        let mut submission = sample_submission();
        submission
            .answers
            .insert("7".to_string(), answer("Select From List"));

        let generated = submission_to_cli(&submission, &table, &settings).unwrap();
        assert!(generated
            .commands
            .contains(&"ztp clear keystore sw01 vlan".to_string()));
        assert!(!generated
            .commands
            .iter()
            .any(|cmd| cmd.starts_with("ztp set keystore sw01 vlan")));
    }

    #[test]
    fn absent_association_emits_clear() {
        let settings = settings(sample_map());
        let table = settings.mapping().unwrap();
        let mut submission = sample_submission();
        submission.answers.remove("6");

        let generated = submission_to_cli(&submission, &table, &settings).unwrap();
        assert!(generated
            .commands
            .contains(&"ztp clear association sw01".to_string()));
    }

    #[test]
    fn empty_idarray_keeps_trailing_empty_argument() {
        let settings = settings(sample_map());
        let table = settings.mapping().unwrap();
        let mut submission = sample_submission();
        submission.answers.remove("5");

        let generated = submission_to_cli(&submission, &table, &settings).unwrap();
        // Compatibility: the idarray command is emitted even with no ids.
        assert_eq!(generated.commands.last().unwrap(), "ztp set idarray sw01 ");
    }

    #[test]
    fn unresolvable_keystore_id_skips_submission() {
        let settings = settings(sample_map());
        let table = settings.mapping().unwrap();
        let mut submission = sample_submission();
        submission
            .answers
            .insert("4".to_string(), answer("Select From List"));

        assert!(submission_to_cli(&submission, &table, &settings).is_none());
    }
}
