use std::collections::BTreeMap;

use crate::{
    DocumentJobPatch, DocumentJobStatus, DocumentPhaseJob, DocumentPhaseKey, DocumentSummary,
};

/// Last-known status of every document phase job the dashboard follows.
///
/// Every write is keyed by a single unit, so pollers writing different keys
/// never touch each other's entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobRegistry {
    entries: BTreeMap<DocumentPhaseKey, DocumentPhaseJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `patch` into the entry for `key`, creating it if absent.
    pub fn upsert(&mut self, key: DocumentPhaseKey, patch: DocumentJobPatch) -> &DocumentPhaseJob {
        let entry = self.entries.entry(key).or_default();
        entry.apply(patch);
        entry
    }

    pub fn remove(&mut self, key: &DocumentPhaseKey) -> Option<DocumentPhaseJob> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &DocumentPhaseKey) -> Option<&DocumentPhaseJob> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocumentPhaseKey, &DocumentPhaseJob)> {
        self.entries.iter()
    }

    /// Drops entries made irrelevant by a refreshed document page.
    ///
    /// Running jobs always survive. Otherwise an entry goes when its document
    /// is not on the page, or when it completed and the page already reports
    /// the phase as successful.
    pub fn prune_for_page(&mut self, documents: &[DocumentSummary]) {
        self.entries.retain(|key, job| {
            if job.is_running() {
                return true;
            }
            let Some(document) = documents.iter().find(|doc| doc.id == key.document_id) else {
                return false;
            };
            let caught_up = document
                .phase_status(key.phase)
                .is_some_and(|status| status.is_successful());
            !(job.status == Some(DocumentJobStatus::Completed) && caught_up)
        });
    }
}
