//! Dedup gate
//!
//! Classifies each attempted save as saved, duplicate, or failed. Store
//! errors never escape the gate: a broken or missing store turns into
//! `SaveVerdict::Failed` and the run keeps going.

use crate::record::BookRecord;
use crate::storage::{BookStore, InsertOutcome};
use std::fmt;
use std::sync::Arc;

/// Verdict for one save attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveVerdict {
    Saved,
    Duplicate,
    Failed(String),
}

impl SaveVerdict {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

impl fmt::Display for SaveVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved => write!(f, "saved"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Insert-if-absent front for a book store
#[derive(Clone)]
pub struct DedupGate {
    store: Option<Arc<dyn BookStore>>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A gate whose store could not be reached; every save fails
    pub fn unavailable() -> Self {
        Self { store: None }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    /// The underlying store, if any
    pub fn store(&self) -> Option<&Arc<dyn BookStore>> {
        self.store.as_ref()
    }

    /// Attempts to save a record under its normalized dedup key
    ///
    /// Concurrent calls for the same key yield exactly one `Saved`; the
    /// decision is made by the store's atomic insert, not here.
    pub fn try_save(&self, record: &BookRecord) -> SaveVerdict {
        let Some(store) = &self.store else {
            return SaveVerdict::Failed("store unavailable".to_string());
        };

        let key = record.dedup_key();
        match store.try_insert(&key, record) {
            Ok(InsertOutcome::Inserted) => SaveVerdict::Saved,
            Ok(InsertOutcome::AlreadyPresent) => SaveVerdict::Duplicate,
            Err(e) => {
                tracing::warn!("Failed to save '{}': {}", record.title.as_deref().unwrap_or("?"), e);
                SaveVerdict::Failed(e.to_string())
            }
        }
    }
}

impl fmt::Debug for DedupGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupGate")
            .field("available", &self.is_available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBookStore, SqliteBookStore};
    use std::thread;

    fn book(title: &str, author: &str) -> BookRecord {
        BookRecord {
            title: Some(title.to_string()),
            author: Some(author.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_saved_then_duplicate_on_normalized_key() {
        let gate = DedupGate::new(Arc::new(MemoryBookStore::new()));
        assert_eq!(gate.try_save(&book("Rust", "Ferris")), SaveVerdict::Saved);
        assert_eq!(gate.try_save(&book("  rust ", "FERRIS")), SaveVerdict::Duplicate);
    }

    #[test]
    fn test_unavailable_gate_fails_every_save() {
        let gate = DedupGate::unavailable();
        assert!(!gate.is_available());
        assert!(matches!(gate.try_save(&book("A", "B")), SaveVerdict::Failed(_)));
    }

    #[test]
    fn test_store_error_becomes_failed() {
        let store = Arc::new(MemoryBookStore::new());
        store.close().unwrap();
        let gate = DedupGate::new(store);
        assert!(matches!(gate.try_save(&book("A", "B")), SaveVerdict::Failed(_)));
    }

    #[test]
    fn test_concurrent_saves_yield_one_saved() {
        let gate = DedupGate::new(Arc::new(SqliteBookStore::new_in_memory().unwrap()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || gate.try_save(&book("Same Book", "Same Author")))
            })
            .collect();

        let verdicts: Vec<SaveVerdict> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(verdicts.iter().filter(|v| v.is_saved()).count(), 1);
        assert_eq!(
            verdicts.iter().filter(|v| **v == SaveVerdict::Duplicate).count(),
            15
        );
    }
}
