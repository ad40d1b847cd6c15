//! Batch processing: fetch -> translate -> persist/restart -> mark read.
//!
//! One run services one fetched batch, single-threaded. Submissions are
//! processed in the order the forms service returns them; within a batch a
//! later submission's values win for the same identity.

use anyhow::{anyhow, bail, Result};

use crate::commands;
use crate::config::{KeystoreMode, MarkReadPolicy, Settings};
use crate::exec::CommandSink;
use crate::forms::FormsService;
use crate::keystore::{self, Keystore};
use crate::notify;

/// What one run did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub fetched: usize,
    /// Submissions whose keystore_id resolved.
    pub resolved: usize,
    pub commands_issued: usize,
    pub restarted: bool,
    pub marked_read: usize,
}

/// Run one processing batch.
///
/// Fatal conditions abort the whole run before mark-read: insufficient API
/// call budget, a missing external keystore in csv mode, or a keystore left
/// empty after processing with unknown import disabled. Per-submission
/// failures only skip that submission.
pub fn run(
    settings: &Settings,
    forms: &impl FormsService,
    sink: &mut impl CommandSink,
    dry_run: bool,
) -> Result<BatchSummary> {
    let table = settings.mapping()?;
    let batch = forms.fetch_new()?;
    let mut summary = BatchSummary {
        fetched: batch.submissions.len(),
        ..BatchSummary::default()
    };

    if batch.submissions.is_empty() {
        tracing::info!("no new submissions");
        return Ok(summary);
    }
    tracing::info!(count = batch.submissions.len(), "new submissions");

    if let Some(calls_left) = batch.calls_left {
        tracing::info!(calls_left, "remaining API calls");
        if (calls_left as usize) < batch.submissions.len() {
            bail!(
                "insufficient remaining API calls ({calls_left}) to service {} submissions; \
                 stopping without processing",
                batch.submissions.len()
            );
        }
    }

    let mut store = match settings.keystore_type {
        KeystoreMode::Csv => {
            let path = settings
                .csv_path
                .as_ref()
                .ok_or_else(|| anyhow!("csv keystore path not configured"))?;
            let store = Keystore::load(path)?
                .ok_or_else(|| anyhow!("external keystore missing: {}", path.display()))?;
            Some(store)
        }
        KeystoreMode::Cli => None,
    };

    let mut restart_needed = false;
    let mut command_set: Vec<String> = Vec::new();
    let mut fetched_ids: Vec<String> = Vec::new();
    let mut resolved_ids: Vec<String> = Vec::new();

    for submission in &batch.submissions {
        // Record before processing: every fetched submission is a mark-read
        // candidate even when its own translation fails.
        fetched_ids.push(submission.id.clone());

        let keystore_id = match (&settings.keystore_type, store.as_mut()) {
            (KeystoreMode::Cli, _) => {
                match commands::submission_to_cli(submission, &table, settings) {
                    Some(generated) => {
                        command_set.extend(generated.commands);
                        restart_needed = true;
                        Some(generated.keystore_id)
                    }
                    None => None,
                }
            }
            (KeystoreMode::Csv, Some(store)) => {
                let update = keystore::submission_to_row(submission, &table, settings, store);
                restart_needed |= update.changed;
                update.keystore_id
            }
            (KeystoreMode::Csv, None) => None,
        };

        if let Some(keystore_id) = keystore_id {
            summary.resolved += 1;
            resolved_ids.push(submission.id.clone());
            if dry_run {
                tracing::info!(%keystore_id, submission = %submission.id, "dry run: notification suppressed");
            } else {
                notify::submission_processed(settings, &submission.id, &keystore_id);
            }
        }
    }
    tracing::info!("all submissions processed");

    if restart_needed {
        if let Some(store) = &store {
            let path = settings
                .csv_path
                .as_ref()
                .ok_or_else(|| anyhow!("csv keystore path not configured"))?;
            if store.rows.is_empty() && !settings.import_unknown {
                bail!(
                    "external keystore is empty and unknown import is disabled; \
                     stopping without marking new submissions as read"
                );
            }
            if dry_run {
                tracing::info!(path = %path.display(), "dry run: keystore not written");
            } else {
                store.save(path)?;
            }
        }

        // The service restart reloads the external file too, so it is
        // appended regardless of keystore mode.
        command_set.push("ztp service restart".to_string());
        summary.commands_issued = command_set.len();
        tracing::debug!(commands = %command_set.join("\n"), "commands for the ztp CLI");

        if dry_run {
            for command in &command_set {
                println!("{command}");
            }
        } else {
            let running = sink.run(&command_set)?;
            summary.restarted = running;
            if running {
                tracing::info!(count = command_set.len(), "commands sent to ztp CLI");
            } else {
                tracing::warn!("ztp did not report a running status after restart");
            }
        }
    } else {
        tracing::info!("no data changes; ztp not restarted");
    }

    if dry_run {
        tracing::info!("dry run: submissions left unread");
        return Ok(summary);
    }

    let to_mark: &[String] = match settings.mark_read {
        MarkReadPolicy::Always => &fetched_ids,
        MarkReadPolicy::OnSuccess => {
            if restart_needed && !summary.restarted {
                tracing::warn!("execution did not report running; submissions left unread");
                &[]
            } else {
                &resolved_ids
            }
        }
    };
    if !to_mark.is_empty() {
        match forms.mark_read(to_mark) {
            Ok(0) => {
                summary.marked_read = to_mark.len();
                tracing::info!(count = to_mark.len(), "submissions marked as read");
            }
            Ok(failures) => {
                summary.marked_read = to_mark.len() - failures;
                tracing::warn!(failures, "some submissions failed to be marked as read");
            }
            Err(err) => tracing::warn!(error = %err, "mark read request failed"),
        }
    }

    Ok(summary)
}
