// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Result cache owned by the caller, keyed by generated ids

use crate::types::DocumentResult;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Identifier handed out when a result is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultId(Uuid);

impl ResultId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared store of finished document results.
///
/// One lock guards insert and lookup. Recognition never touches it.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: Mutex<FxHashMap<ResultId, Arc<DocumentResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated
    fn lock(&self) -> MutexGuard<'_, FxHashMap<ResultId, Arc<DocumentResult>>> {
        self.results.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, result: DocumentResult) -> ResultId {
        let id = ResultId::new();
        self.lock().insert(id, Arc::new(result));
        tracing::debug!(%id, "Stored recognition result");
        id
    }

    pub fn get(&self, id: &ResultId) -> Option<Arc<DocumentResult>> {
        self.lock().get(id).cloned()
    }

    pub fn remove(&self, id: &ResultId) -> Option<Arc<DocumentResult>> {
        self.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecognitionStatistics;
    use std::thread;

    fn empty_document() -> DocumentResult {
        DocumentResult {
            pages: Vec::new(),
            statistics: RecognitionStatistics::default(),
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let store = ResultStore::new();
        let id = store.insert(empty_document());

        assert_eq!(store.len(), 1);
        assert!(store.get(&id).is_some());
        assert!(store.get(&ResultId::new()).is_none());
        assert!(store.remove(&id).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_id_round_trips_through_text() {
        let id = ResultId::new();
        assert_eq!(ResultId::parse(&id.to_string()), Some(id));
        assert_eq!(ResultId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = Arc::new(ResultStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.insert(empty_document()))
            })
            .collect();
        let ids: Vec<ResultId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(store.len(), 8);
        assert!(ids.iter().all(|id| store.get(id).is_some()));
    }
}
