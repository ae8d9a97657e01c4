//! Record store interface
//!
//! Ingestion and enrichment persist through [`RecordStore`]. Assemblies may be
//! looked up by either of their accessions. Sequence pages are keyset-paginated
//! on the INSDC sequence accession: the page token is the accession of the last
//! row returned, so rows updated between pages never shift the window.
//!
//! [`InMemoryRecordStore`] backs the command-line tool and the tests.

use crate::models::{AssemblyRecord, SequenceRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Assembly has neither an INSDC nor a RefSeq accession")]
    MissingAccession,

    #[error("Accession {accession} is already stored")]
    Conflict { accession: String },

    #[error("Store backend failure: {0}")]
    Backend(String),
}

/// One page of a keyset-paginated query
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Pass as `after` to fetch the next page; `None` when exhausted
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_token: None,
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Find an assembly, with its sequences, by INSDC or RefSeq accession
    async fn find_by_accession(&self, accession: &str)
        -> Result<Option<AssemblyRecord>, StoreError>;

    /// Persist an assembly and its sequences as one unit
    async fn save(&self, assembly: AssemblyRecord) -> Result<(), StoreError>;

    /// Remove an assembly and its sequences; `false` when nothing matched
    async fn delete_by_accession(&self, accession: &str) -> Result<bool, StoreError>;

    /// Sequences of `assembly` ordered by INSDC accession, starting after `after`
    async fn find_sequences(
        &self,
        assembly: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Page<SequenceRecord>, StoreError>;

    /// Like [`find_sequences`](Self::find_sequences), restricted to rows without an MD5
    async fn find_sequences_needing_checksum(
        &self,
        assembly: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Page<SequenceRecord>, StoreError>;

    /// Copy enrichment fields (MD5, ENA name) onto stored sequences
    ///
    /// Rows are matched by owning assembly and INSDC accession. Unknown rows
    /// are ignored. Returns the number of rows updated.
    async fn bulk_update_sequences(&self, updates: Vec<SequenceRecord>)
        -> Result<usize, StoreError>;

    /// Primary accessions of assemblies with at least one sequence lacking an MD5
    async fn find_assemblies_needing_checksum(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug)]
struct StoredAssembly {
    record: AssemblyRecord,
    sequences: Vec<SequenceRecord>,
    by_accession: BTreeMap<String, usize>,
}

impl StoredAssembly {
    fn page<F>(&self, after: Option<&str>, limit: usize, keep: F) -> Page<SequenceRecord>
    where
        F: Fn(&SequenceRecord) -> bool,
    {
        let lower = match after {
            Some(token) => std::ops::Bound::Excluded(token.to_string()),
            None => std::ops::Bound::Unbounded,
        };

        let items: Vec<SequenceRecord> = self
            .by_accession
            .range((lower, std::ops::Bound::Unbounded))
            .map(|(_, &idx)| &self.sequences[idx])
            .filter(|s| keep(s))
            .take(limit)
            .cloned()
            .collect();

        let next_token = if limit > 0 && items.len() == limit {
            items.last().map(|s| s.insdc_accession.clone())
        } else {
            None
        };

        Page { items, next_token }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    assemblies: HashMap<String, StoredAssembly>,
    /// Both accessions of every assembly -> primary accession
    aliases: HashMap<String, String>,
}

impl StoreState {
    fn resolve(&self, accession: &str) -> Option<&StoredAssembly> {
        self.aliases
            .get(accession)
            .and_then(|primary| self.assemblies.get(primary))
    }
}

/// Process-local [`RecordStore`]
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: RwLock<StoreState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assembly_count(&self) -> usize {
        self.state.read().await.assemblies.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_by_accession(
        &self,
        accession: &str,
    ) -> Result<Option<AssemblyRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.resolve(accession).map(|stored| {
            let mut record = stored.record.clone();
            record.sequences = stored.sequences.clone();
            record
        }))
    }

    async fn save(&self, mut assembly: AssemblyRecord) -> Result<(), StoreError> {
        let primary = assembly
            .primary_accession()
            .ok_or(StoreError::MissingAccession)?
            .to_string();

        let mut state = self.state.write().await;
        if let Some(taken) = assembly.accessions().find(|a| state.aliases.contains_key(*a)) {
            return Err(StoreError::Conflict {
                accession: taken.to_string(),
            });
        }

        let mut sequences = std::mem::take(&mut assembly.sequences);
        let mut by_accession = BTreeMap::new();
        for (idx, sequence) in sequences.iter_mut().enumerate() {
            sequence.assembly_accession = Some(primary.clone());
            by_accession.insert(sequence.insdc_accession.clone(), idx);
        }

        for accession in assembly.accessions() {
            state.aliases.insert(accession.to_string(), primary.clone());
        }

        debug!(accession = %primary, sequences = sequences.len(), "Saved assembly");
        state.assemblies.insert(
            primary,
            StoredAssembly {
                record: assembly,
                sequences,
                by_accession,
            },
        );
        Ok(())
    }

    async fn delete_by_accession(&self, accession: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(primary) = state.aliases.get(accession).cloned() else {
            return Ok(false);
        };

        if let Some(stored) = state.assemblies.remove(&primary) {
            for alias in stored.record.accessions() {
                state.aliases.remove(alias);
            }
            debug!(accession = %primary, sequences = stored.sequences.len(), "Deleted assembly");
        }
        Ok(true)
    }

    async fn find_sequences(
        &self,
        assembly: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Page<SequenceRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .resolve(assembly)
            .map(|stored| stored.page(after, limit, |_| true))
            .unwrap_or_else(Page::empty))
    }

    async fn find_sequences_needing_checksum(
        &self,
        assembly: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Page<SequenceRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .resolve(assembly)
            .map(|stored| stored.page(after, limit, |s| s.md5_checksum.is_none()))
            .unwrap_or_else(Page::empty))
    }

    async fn bulk_update_sequences(
        &self,
        updates: Vec<SequenceRecord>,
    ) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let mut updated = 0;

        for update in updates {
            let Some(owner) = update
                .assembly_accession
                .as_deref()
                .and_then(|a| state.aliases.get(a))
                .cloned()
            else {
                continue;
            };
            let Some(stored) = state.assemblies.get_mut(&owner) else {
                continue;
            };
            let Some(&idx) = stored.by_accession.get(&update.insdc_accession) else {
                continue;
            };

            let target = &mut stored.sequences[idx];
            if update.md5_checksum.is_some() {
                target.md5_checksum = update.md5_checksum;
            }
            if update.ena_sequence_name.is_some() {
                target.ena_sequence_name = update.ena_sequence_name;
            }
            updated += 1;
        }

        Ok(updated)
    }

    async fn find_assemblies_needing_checksum(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.read().await;
        let mut accessions: Vec<String> = state
            .assemblies
            .iter()
            .filter(|(_, stored)| stored.sequences.iter().any(|s| s.md5_checksum.is_none()))
            .map(|(primary, _)| primary.clone())
            .collect();
        accessions.sort();
        Ok(accessions)
    }
}
