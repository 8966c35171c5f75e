use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::app::ports::FindingSink;
use crate::error::{Result, ScoutError};
use crate::finding::Finding;

/// In-memory finding store for the CLI and tests. Upserts by natural key, keeping
/// insertion order for output.
#[derive(Clone, Default)]
pub struct InMemoryFindingStore {
    findings: Arc<Mutex<HashMap<String, Finding>>>,
    order: Arc<Mutex<Vec<String>>>,
}

impl InMemoryFindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.findings.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, natural_key: &str) -> Option<Finding> {
        self.findings.lock().ok()?.get(natural_key).cloned()
    }

    /// All findings in first-inserted order.
    pub fn all(&self) -> Vec<Finding> {
        let (Ok(findings), Ok(order)) = (self.findings.lock(), self.order.lock()) else {
            return Vec::new();
        };
        order.iter().filter_map(|key| findings.get(key).cloned()).collect()
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.all())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[async_trait]
impl FindingSink for InMemoryFindingStore {
    async fn upsert(&self, finding: &Finding) -> Result<()> {
        let key = finding.natural_key();
        let mut findings = self
            .findings
            .lock()
            .map_err(|_| ScoutError::Persistence("finding store lock poisoned".to_string()))?;
        if findings.insert(key.clone(), finding.clone()).is_none() {
            self.order
                .lock()
                .map_err(|_| ScoutError::Persistence("finding store lock poisoned".to_string()))?
                .push(key.clone());
            debug!(key = %key, "Stored new finding");
        } else {
            debug!(key = %key, "Updated existing finding");
        }
        Ok(())
    }
}
