//! In-memory collaborator implementations
//!
//! Used by tests and the demo binary. The trajectory store keeps
//! everything behind one async mutex; the gates are trivial.

use crate::collaborators::{BootstrapState, OracleGate, TrajectoryRecord, TrajectoryStore};
use async_trait::async_trait;
use ouro_core::{Domain, Result};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    trajectories: Vec<TrajectoryRecord>,
    heuristics: BTreeMap<Domain, Vec<String>>,
    bootstrap: BTreeMap<Domain, BootstrapState>,
    belief_delta: BTreeMap<String, String>,
    capability_delta: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct MemoryTrajectoryStore {
    inner: Mutex<Inner>,
}

impl MemoryTrajectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a belief change to be drained with the next frame write.
    pub async fn record_belief(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.belief_delta.insert(key.into(), value.into());
    }

    /// Record a capability change to be drained with the next frame write.
    pub async fn record_capability(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.capability_delta.insert(key.into(), value.into());
    }

    pub async fn trajectory_count(&self) -> usize {
        self.inner.lock().await.trajectories.len()
    }

    pub async fn heuristics_for(&self, domain: Domain) -> Vec<String> {
        self.inner
            .lock()
            .await
            .heuristics
            .get(&domain)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TrajectoryStore for MemoryTrajectoryStore {
    async fn append_trajectory(&self, record: TrajectoryRecord) -> Result<()> {
        self.inner.lock().await.trajectories.push(record);
        Ok(())
    }

    async fn read_successful_trajectories(
        &self,
        domain: Domain,
        limit: usize,
    ) -> Result<Vec<TrajectoryRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .trajectories
            .iter()
            .rev()
            .filter(|t| t.domain == domain && t.success)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn store_or_merge_heuristic(
        &self,
        domain: Domain,
        content: &str,
        _trajectory_count: usize,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let entries = inner.heuristics.entry(domain).or_default();
        if !entries.iter().any(|h| h == content) {
            entries.push(content.to_string());
        }
        Ok(())
    }

    async fn read_bootstrap_state(&self, domain: Domain) -> Result<BootstrapState> {
        Ok(self
            .inner
            .lock()
            .await
            .bootstrap
            .get(&domain)
            .copied()
            .unwrap_or_default())
    }

    async fn write_bootstrap_state(&self, domain: Domain, state: BootstrapState) -> Result<()> {
        self.inner.lock().await.bootstrap.insert(domain, state);
        Ok(())
    }

    async fn drain_deltas(
        &self,
    ) -> Result<(BTreeMap<String, String>, BTreeMap<String, String>)> {
        let mut inner = self.inner.lock().await;
        let beliefs = std::mem::take(&mut inner.belief_delta);
        let capabilities = std::mem::take(&mut inner.capability_delta);
        Ok((beliefs, capabilities))
    }
}

/// Gate that allows every domain.
pub struct AlwaysOpenGate;

#[async_trait]
impl OracleGate for AlwaysOpenGate {
    async fn can_practice(&self, _domain: Domain) -> Result<bool> {
        Ok(true)
    }
}

/// Gate with a fixed blocklist.
pub struct BlocklistGate {
    blocked: Vec<Domain>,
}

impl BlocklistGate {
    pub fn new(blocked: Vec<Domain>) -> Self {
        Self { blocked }
    }
}

#[async_trait]
impl OracleGate for BlocklistGate {
    async fn can_practice(&self, domain: Domain) -> Result<bool> {
        Ok(!self.blocked.contains(&domain))
    }
}
