//! Per-deployment operation guarding.
//!
//! At most one mutating operation may run against a deployment name at a
//! time. The guard is an explicit lease table: acquiring is a single
//! atomic insert-if-vacant, there is no queue, and a contended acquire
//! reports the conflict immediately instead of waiting. The lease is an
//! RAII value; it releases its table entry on drop, which covers every
//! exit path of the guarded operation, including unwinds and cancelled
//! tasks.

use std::sync::Arc;

use canopy_types::{DeploymentName, OperationKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct LeaseMarker {
    token: Uuid,
    operation: OperationKind,
}

/// Lease table keyed by deployment name.
#[derive(Debug, Default)]
pub struct OperationGuard {
    leases: Arc<DashMap<DeploymentName, LeaseMarker>>,
}

impl OperationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the name for `operation`. Returns `None` without waiting
    /// when any operation already holds the name.
    pub fn try_acquire(
        &self,
        name: &DeploymentName,
        operation: OperationKind,
    ) -> Option<OperationLease> {
        let marker = LeaseMarker {
            token: Uuid::new_v4(),
            operation,
        };
        match self.leases.entry(name.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(marker);
                debug!(deployment = %name, operation = %operation, "lease acquired");
                Some(OperationLease {
                    name: name.clone(),
                    token: marker.token,
                    operation,
                    table: Arc::clone(&self.leases),
                })
            }
        }
    }

    /// The operation currently holding the name, if any.
    pub fn current(&self, name: &DeploymentName) -> Option<OperationKind> {
        self.leases.get(name).map(|marker| marker.operation)
    }

    /// Number of leases currently held.
    pub fn in_flight(&self) -> usize {
        self.leases.len()
    }
}

/// Exclusive claim on a deployment name for one operation.
#[derive(Debug)]
pub struct OperationLease {
    name: DeploymentName,
    token: Uuid,
    operation: OperationKind,
    table: Arc<DashMap<DeploymentName, LeaseMarker>>,
}

impl OperationLease {
    pub fn name(&self) -> &DeploymentName {
        &self.name
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }
}

impl Drop for OperationLease {
    fn drop(&mut self) {
        // Token check so a lease can only ever remove its own entry.
        self.table
            .remove_if(&self.name, |_, marker| marker.token == self.token);
        debug!(deployment = %self.name, operation = %self.operation, "lease released");
    }
}
