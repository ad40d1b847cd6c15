//! External keystore: CSV persistence and per-submission row updates.
//!
//! The keystore file is a header-first CSV keyed case-insensitively on the
//! `keystore_id` column. It is read once per batch, mutated in memory across
//! every submission, and written back once if anything changed.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Settings;
use crate::extract;
use crate::forms::Submission;
use crate::mapping::MappingTable;

const ID_COLUMN: &str = "keystore_id";

/// One device identity's row. The identity keeps its submitted casing in
/// `display_id`; rows are addressed by the upper-cased form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoreRow {
    pub display_id: String,
    /// Every non-`keystore_id` column.
    pub fields: BTreeMap<String, String>,
}

impl KeystoreRow {
    fn new(display_id: String) -> KeystoreRow {
        KeystoreRow {
            display_id,
            fields: BTreeMap::new(),
        }
    }
}

/// Full external keystore: column headers plus rows keyed by upper-cased
/// identity. Headers grow monotonically as new variables appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keystore {
    pub headers: Vec<String>,
    pub rows: BTreeMap<String, KeystoreRow>,
}

impl Keystore {
    /// Read the keystore file. A missing file is an operator error state
    /// (`Ok(None)` with a warning); csv-mode callers escalate it to fatal.
    pub fn load(path: &Path) -> Result<Option<Keystore>> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "referenced keystore is missing and execution mode is csv; \
                 create the keystore file or re-run setup"
            );
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("open external keystore {}", path.display()))?;
        let headers: Vec<String> = reader
            .headers()
            .context("read keystore headers")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = BTreeMap::new();
        for record in reader.records() {
            let record = record.context("read keystore row")?;
            let mut display_id = None;
            let mut fields = BTreeMap::new();
            for (name, value) in headers.iter().zip(record.iter()) {
                if name == ID_COLUMN {
                    display_id = Some(value.to_string());
                } else {
                    fields.insert(name.clone(), value.to_string());
                }
            }
            match display_id {
                Some(id) if !id.is_empty() => {
                    rows.insert(
                        id.to_uppercase(),
                        KeystoreRow {
                            display_id: id,
                            fields,
                        },
                    );
                }
                _ => tracing::warn!("keystore row without a keystore_id value; skipped"),
            }
        }

        tracing::info!(count = rows.len(), "read external keystore");
        Ok(Some(Keystore { headers, rows }))
    }

    /// Write the keystore back: header record first, then each row using the
    /// current headers as the column set. Missing columns serialize empty.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("write external keystore {}", path.display()))?;
        writer
            .write_record(&self.headers)
            .context("write keystore headers")?;
        for row in self.rows.values() {
            let record: Vec<&str> = self
                .headers
                .iter()
                .map(|header| {
                    if header == ID_COLUMN {
                        row.display_id.as_str()
                    } else {
                        row.fields.get(header).map(String::as_str).unwrap_or("")
                    }
                })
                .collect();
            writer.write_record(&record).context("write keystore row")?;
        }
        writer.flush().context("flush external keystore")?;
        tracing::info!(count = self.rows.len(), "wrote external keystore");
        Ok(())
    }
}

/// Outcome of applying one submission to the keystore.
#[derive(Debug, Clone)]
pub struct RowUpdate {
    pub changed: bool,
    pub keystore_id: Option<String>,
}

impl RowUpdate {
    fn unchanged() -> RowUpdate {
        RowUpdate {
            changed: false,
            keystore_id: None,
        }
    }
}

/// Merge one submission's answers into the keystore.
///
/// Every non-identity variable stages a value; an absent answer stages an
/// explicit blank so a resubmission with a null answer clears the column.
/// A variable the submission *omits* from the mapping entirely is never
/// retracted; only explicit nulls clear prior values.
///
/// Unknown identities follow the import policy: with `import_unknown` a
/// partial row is created (warned, incomplete data may cause merge issues),
/// without it the submission is ignored for csv purposes.
pub fn submission_to_row(
    submission: &Submission,
    table: &MappingTable,
    settings: &Settings,
    store: &mut Keystore,
) -> RowUpdate {
    let Some(keystore_id) = extract::resolve(submission, &table.keystore_id, settings) else {
        tracing::warn!(
            submission = %submission.id,
            "keystore_id could not be resolved; row update skipped"
        );
        return RowUpdate::unchanged();
    };
    tracing::info!(%keystore_id, "processing submission");

    let mut staged: Vec<(String, Option<String>)> = Vec::new();
    for var in &table.vars {
        let value = extract::resolve(submission, &var.entry, settings);
        tracing::debug!(variable = %var.name, value = ?value, "staged update");
        staged.push((var.name.clone(), value));
    }

    let lookup_key = keystore_id.to_uppercase();
    if !store.rows.contains_key(&lookup_key) {
        if !settings.import_unknown {
            tracing::warn!(
                %keystore_id,
                "unknown id and unknown import is disabled; item skipped"
            );
            return RowUpdate::unchanged();
        }
        tracing::warn!(
            %keystore_id,
            "unknown id added to external keystore; incomplete data may cause merge issues"
        );
        store
            .rows
            .insert(lookup_key.clone(), KeystoreRow::new(keystore_id.clone()));
    }

    // A blank source file only reaches this point with import enabled.
    if store.headers.is_empty() {
        tracing::warn!("blank external keystore found; creating keystore_id header");
        store.headers.push(ID_COLUMN.to_string());
    }
    for (name, _) in &staged {
        if !store.headers.iter().any(|header| header == name) {
            tracing::debug!(header = %name, "header missing; adding");
            store.headers.push(name.clone());
        }
    }

    let Some(row) = store.rows.get_mut(&lookup_key) else {
        return RowUpdate::unchanged();
    };
    for (name, value) in staged {
        row.fields.insert(name, value.unwrap_or_default());
    }

    tracing::info!(%keystore_id, "finished updating keystore values");
    RowUpdate {
        changed: true,
        keystore_id: Some(keystore_id),
    }
}
