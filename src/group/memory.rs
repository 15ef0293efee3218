//! In-memory group plugin.
//!
//! Keeps committed specs in a concurrent map. A numeric `Size` property on a
//! spec is reported back by `describe_group` as that many instances, up to
//! [`MAX_GROUP_SIZE`].

use async_trait::async_trait;
use dashmap::DashMap;

use crate::group::service::{GroupError, GroupPlugin};
use crate::group::types::{GroupDescription, GroupId, GroupSpec, InstanceDescription};

/// Largest `Size` a committed spec may declare.
pub const MAX_GROUP_SIZE: u64 = 10_000;

#[derive(Debug, Default)]
pub struct MemoryGroupPlugin {
    groups: DashMap<GroupId, GroupSpec>,
}

impl MemoryGroupPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn declared_size(spec: &GroupSpec) -> u64 {
    spec.properties
        .as_ref()
        .and_then(|p| p.get("Size"))
        .and_then(|s| s.as_u64())
        .unwrap_or(0)
        .min(MAX_GROUP_SIZE)
}

fn check_size(spec: &GroupSpec) -> Result<(), GroupError> {
    let Some(size) = spec.properties.as_ref().and_then(|p| p.get("Size")) else {
        return Ok(());
    };
    match size.as_u64() {
        Some(n) if n <= MAX_GROUP_SIZE => Ok(()),
        Some(n) => Err(GroupError::InvalidSpec(format!(
            "Size {} exceeds the limit of {}",
            n, MAX_GROUP_SIZE
        ))),
        None => Err(GroupError::InvalidSpec(format!(
            "Size must be a non-negative integer, got {}",
            size
        ))),
    }
}

#[async_trait]
impl GroupPlugin for MemoryGroupPlugin {
    async fn commit_group(&self, spec: GroupSpec, pretend: bool) -> Result<String, GroupError> {
        if spec.id.is_empty() {
            return Err(GroupError::InvalidSpec("missing group ID".to_string()));
        }
        check_size(&spec)?;

        let exists = self.groups.contains_key(&spec.id);
        let details = match (pretend, exists) {
            (true, false) => format!("would create group {}", spec.id),
            (true, true) => format!("would update group {}", spec.id),
            (false, false) => format!("created group {}", spec.id),
            (false, true) => format!("updated group {}", spec.id),
        };

        if !pretend {
            tracing::debug!(group = %spec.id, "Committing group");
            self.groups.insert(spec.id.clone(), spec);
        }
        Ok(details)
    }

    async fn free_group(&self, id: &GroupId) -> Result<(), GroupError> {
        self.groups
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| GroupError::NotFound(id.clone()))
    }

    async fn describe_group(&self, id: &GroupId) -> Result<GroupDescription, GroupError> {
        let spec = self
            .groups
            .get(id)
            .ok_or_else(|| GroupError::NotFound(id.clone()))?;

        let instances = (0..declared_size(&spec))
            .map(|i| InstanceDescription {
                id: format!("{}-{}", id, i),
                logical_id: None,
                tags: [("group".to_string(), id.to_string())].into_iter().collect(),
            })
            .collect();

        Ok(GroupDescription {
            instances,
            converged: true,
        })
    }

    async fn destroy_group(&self, id: &GroupId) -> Result<(), GroupError> {
        match self.groups.remove(id) {
            Some(_) => {
                tracing::debug!(group = %id, "Destroyed group");
                Ok(())
            }
            None => Err(GroupError::NotFound(id.clone())),
        }
    }

    async fn inspect_groups(&self) -> Result<Vec<GroupSpec>, GroupError> {
        let mut specs: Vec<GroupSpec> = self.groups.iter().map(|e| e.value().clone()).collect();
        specs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(specs)
    }
}
