use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use stockline_core::TenantId;

/// Tenant-isolated key/value store abstraction for disposable read models.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Clear all read-model records for a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory [`TenantStore`] partitioned by tenant.
///
/// Each tenant gets its own inner map, so listing or clearing a tenant
/// never scans another tenant's records and isolation falls out of the
/// layout instead of a key filter.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    partitions: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let partitions = self.partitions.read().ok()?;
        partitions.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.entry(tenant_id).or_default().insert(key, value);
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let Ok(partitions) = self.partitions.read() else {
            return vec![];
        };

        partitions
            .get(&tenant_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.remove(&tenant_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_get_list_are_tenant_scoped() {
        let store: InMemoryTenantStore<u32, String> = InMemoryTenantStore::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());

        store.upsert(t1, 1, "a".to_string());
        store.upsert(t1, 2, "b".to_string());
        store.upsert(t2, 1, "x".to_string());

        assert_eq!(store.get(t1, &1), Some("a".to_string()));
        assert_eq!(store.get(t2, &1), Some("x".to_string()));
        assert_eq!(store.list(t1).len(), 2);
        assert_eq!(store.list(t2).len(), 1);
    }

    #[test]
    fn upsert_replaces_an_existing_record() {
        let store: InMemoryTenantStore<u32, String> = InMemoryTenantStore::new();
        let t = TenantId::new();

        store.upsert(t, 1, "before".to_string());
        store.upsert(t, 1, "after".to_string());

        assert_eq!(store.get(t, &1), Some("after".to_string()));
        assert_eq!(store.list(t).len(), 1);
    }

    #[test]
    fn clear_tenant_removes_only_that_tenant() {
        let store: InMemoryTenantStore<u32, String> = InMemoryTenantStore::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());

        store.upsert(t1, 1, "a".to_string());
        store.upsert(t2, 1, "x".to_string());

        store.clear_tenant(t1);
        assert!(store.list(t1).is_empty());
        assert_eq!(store.list(t2).len(), 1);
    }
}
