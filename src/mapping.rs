//! Mapping-table resolution.
//!
//! The settings file carries `data_map` as a plain name -> recipe object. The
//! names encode roles by convention (`keystore_id`, `idarray_<n>`,
//! `association`, anything else is a custom keystore variable). Resolving the
//! table classifies every name exactly once, so the generators downstream
//! match on a tagged variant instead of re-inspecting strings per submission.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One variable's resolution recipe: which question holds the answer and
/// which delimiter-separated element of it to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Question identifier within a submission's answer set.
    #[serde(rename = "qID")]
    pub answer_id: String,

    /// Zero-based element index after splitting on the delimiter.
    #[serde(rename = "index")]
    pub sub_index: usize,
}

/// Role a mapped variable plays in the generated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarKind {
    /// The device's unique provisioning identity. Exactly one per table.
    KeystoreId,
    /// One hardware identifier slot in a stacked-device id array.
    IdArray(u32),
    /// Configuration-template binding.
    Association,
    /// Operator-defined keystore variable.
    Custom(String),
}

/// A classified mapping-table entry.
#[derive(Debug, Clone)]
pub struct ResolvedVar {
    pub name: String,
    pub kind: VarKind,
    pub entry: MappingEntry,
}

/// Mapping table with the identity recipe split out from the rest.
///
/// `vars` keeps the settings file's iteration order (stable within a run);
/// that order drives command emission order.
#[derive(Debug, Clone)]
pub struct MappingTable {
    pub keystore_id: MappingEntry,
    pub vars: Vec<ResolvedVar>,
}

impl MappingTable {
    /// Classify every `data_map` entry. Fails when the table is unusable:
    /// no `keystore_id` recipe, or more than one.
    pub fn resolve(data_map: &BTreeMap<String, MappingEntry>) -> Result<MappingTable> {
        let mut keystore_id = None;
        let mut vars = Vec::new();

        for (name, entry) in data_map {
            match classify(name) {
                VarKind::KeystoreId => {
                    if keystore_id.is_some() {
                        return Err(anyhow!("data_map defines keystore_id more than once"));
                    }
                    keystore_id = Some(entry.clone());
                }
                kind => vars.push(ResolvedVar {
                    name: name.clone(),
                    kind,
                    entry: entry.clone(),
                }),
            }
        }

        let keystore_id =
            keystore_id.ok_or_else(|| anyhow!("data_map has no keystore_id entry; run setup"))?;
        Ok(MappingTable { keystore_id, vars })
    }
}

fn classify(name: &str) -> VarKind {
    if name.contains("keystore_id") {
        VarKind::KeystoreId
    } else if name.contains("idarray") {
        VarKind::IdArray(idarray_slot(name))
    } else if name.contains("association") {
        VarKind::Association
    } else {
        VarKind::Custom(name.to_string())
    }
}

/// Slot number from an `idarray_<n>` name; 0 when no numeric suffix exists.
fn idarray_slot(name: &str) -> u32 {
    name.rsplit('_')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(qid: &str, index: usize) -> MappingEntry {
        MappingEntry {
            answer_id: qid.to_string(),
            sub_index: index,
        }
    }

    #[test]
    fn resolve_classifies_reserved_names() {
        let mut map = BTreeMap::new();
        map.insert("keystore_id".to_string(), entry("4", 0));
        map.insert("idarray_1".to_string(), entry("5", 0));
        map.insert("idarray_2".to_string(), entry("5", 1));
        map.insert("association".to_string(), entry("6", 0));
        map.insert("vlan".to_string(), entry("7", 0));

        let table = MappingTable::resolve(&map).unwrap();
        assert_eq!(table.keystore_id, entry("4", 0));
        assert_eq!(table.vars.len(), 4);

        let kinds: Vec<&VarKind> = table.vars.iter().map(|var| &var.kind).collect();
        assert!(kinds.contains(&&VarKind::IdArray(1)));
        assert!(kinds.contains(&&VarKind::IdArray(2)));
        assert!(kinds.contains(&&VarKind::Association));
        assert!(kinds.contains(&&VarKind::Custom("vlan".to_string())));
    }

    #[test]
    fn resolve_requires_keystore_id() {
        let mut map = BTreeMap::new();
        map.insert("vlan".to_string(), entry("7", 0));
        assert!(MappingTable::resolve(&map).is_err());
    }

    #[test]
    fn idarray_slot_without_suffix_is_zero() {
        assert_eq!(idarray_slot("idarray"), 0);
        assert_eq!(idarray_slot("idarray_3"), 3);
        assert_eq!(idarray_slot("idarray_12"), 12);
    }
}
