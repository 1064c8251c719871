use std::cell::RefCell;
use std::future::Future;

use tracing::{debug, info, warn};

use super::{TenantError, TenantId};

tokio::task_local! {
    static CURRENT_TENANT: RefCell<TenantState>;
}

/// Lifecycle of the tenant slot owned by one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantState {
    Unresolved,
    Resolved(TenantId),
    Cleared,
}

/// Per-unit-of-work tenant storage.
///
/// The slot only exists inside [`TenantContext::scope`] (or [`TenantContext::sync_scope`]).
/// Each scope starts `Unresolved` and is dropped together with the future or closure it
/// wraps, so a slot can never outlive its request or be observed by another one.
/// Tasks spawned from inside a scope do not inherit it.
pub struct TenantContext;

impl TenantContext {
    /// Run `fut` as one unit of work with its own empty tenant slot
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        CURRENT_TENANT
            .scope(RefCell::new(TenantState::Unresolved), fut)
            .await
    }

    /// Blocking counterpart of [`TenantContext::scope`] for synchronous work
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        CURRENT_TENANT.sync_scope(RefCell::new(TenantState::Unresolved), f)
    }

    /// Open a scope, install `tenant_id` and clear it once `fut` finishes
    pub async fn with_tenant<F: Future>(tenant_id: TenantId, fut: F) -> Result<F::Output, TenantError> {
        Self::scope(async move {
            let _guard = Self::enter(tenant_id)?;
            Ok::<_, TenantError>(fut.await)
        })
        .await
    }

    /// Install `tenant_id` for the current unit of work. Last write wins.
    pub fn set_tenant_id(tenant_id: TenantId) -> Result<(), TenantError> {
        CURRENT_TENANT
            .try_with(|slot| {
                let mut state = slot.borrow_mut();
                match *state {
                    TenantState::Resolved(previous) if previous != tenant_id => {
                        warn!("Tenant context overwritten: {} -> {}", previous, tenant_id);
                    }
                    _ => debug!("Setting tenant_id: {}", tenant_id),
                }
                *state = TenantState::Resolved(tenant_id);
            })
            .map_err(|_| TenantError::OutsideScope)
    }

    /// Current tenant, or `None` when unresolved, cleared or outside any scope
    pub fn tenant_id() -> Option<TenantId> {
        match Self::state() {
            Some(TenantState::Resolved(id)) => Some(id),
            _ => None,
        }
    }

    pub fn has_tenant() -> bool {
        Self::tenant_id().is_some()
    }

    /// Remove the installed tenant. Idempotent, and a no-op outside any scope.
    pub fn clear() {
        let _ = CURRENT_TENANT.try_with(|slot| {
            let mut state = slot.borrow_mut();
            if let TenantState::Resolved(id) = *state {
                debug!("Clearing tenant context for tenant_id: {}", id);
            }
            *state = TenantState::Cleared;
        });
    }

    /// Slot state, `None` outside any scope
    pub fn state() -> Option<TenantState> {
        CURRENT_TENANT.try_with(|slot| *slot.borrow()).ok()
    }

    /// Fail-closed gate for tenant-scoped data access
    pub fn require() -> Result<ActiveTenant, TenantError> {
        match Self::state() {
            Some(TenantState::Resolved(id)) => Ok(ActiveTenant { id }),
            Some(_) => Err(TenantError::Unresolved),
            None => Err(TenantError::OutsideScope),
        }
    }

    /// Install `tenant_id` and return a guard that clears the slot when dropped.
    ///
    /// The guard runs on every exit path of the enclosing code: normal return,
    /// `?` early return, panic unwinding and cancellation of the owning future.
    pub fn enter(tenant_id: TenantId) -> Result<TenantGuard, TenantError> {
        Self::set_tenant_id(tenant_id)?;
        Ok(TenantGuard { _private: () })
    }
}

/// Clears the tenant context on drop
#[must_use = "the tenant is cleared as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TenantGuard {
    _private: (),
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        TenantContext::clear();
    }
}

/// Proof that a tenant was resolved for the current unit of work.
///
/// Only [`TenantContext::require`] hands these out; tenant-scoped store
/// operations take one by reference. It is neither `Clone` nor `Copy`, so it
/// cannot be stashed and reused past the unit of work that resolved it.
#[derive(Debug, PartialEq, Eq)]
pub struct ActiveTenant {
    id: TenantId,
}

impl ActiveTenant {
    pub fn id(&self) -> TenantId {
        self.id
    }
}

/// Capability for cross-tenant administrative reads such as listing tenants.
///
/// It carries no tenant and grants no access to tenant-scoped data: jobs that
/// need tenant rows must still bind each tenant through a [`TenantContext`] scope.
#[derive(Debug)]
pub struct MaintenanceScope {
    job: &'static str,
}

impl MaintenanceScope {
    pub fn begin(job: &'static str) -> Self {
        info!("Opening cross-tenant maintenance scope for job '{}'", job);
        Self { job }
    }

    pub fn job(&self) -> &'static str {
        self.job
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tid(id: i64) -> TenantId {
        TenantId::try_from(id).unwrap()
    }

    #[tokio::test]
    async fn set_get_clear_sequence() {
        TenantContext::scope(async {
            assert_eq!(TenantContext::state(), Some(TenantState::Unresolved));
            assert_eq!(TenantContext::tenant_id(), None);

            TenantContext::set_tenant_id(tid(42)).unwrap();
            assert_eq!(TenantContext::tenant_id(), Some(tid(42)));
            assert!(TenantContext::has_tenant());

            TenantContext::clear();
            assert_eq!(TenantContext::tenant_id(), None);
            assert!(!TenantContext::has_tenant());
            assert_eq!(TenantContext::state(), Some(TenantState::Cleared));

            // clearing twice is a no-op
            TenantContext::clear();
            assert_eq!(TenantContext::state(), Some(TenantState::Cleared));
        })
        .await;
    }

    #[tokio::test]
    async fn last_write_wins() {
        TenantContext::scope(async {
            TenantContext::set_tenant_id(tid(1)).unwrap();
            TenantContext::set_tenant_id(tid(2)).unwrap();
            assert_eq!(TenantContext::tenant_id(), Some(tid(2)));
        })
        .await;
    }

    #[test]
    fn outside_scope_is_absent_and_rejects_writes() {
        assert_eq!(TenantContext::state(), None);
        assert_eq!(TenantContext::tenant_id(), None);
        assert!(!TenantContext::has_tenant());
        TenantContext::clear();
        assert_eq!(TenantContext::set_tenant_id(tid(5)), Err(TenantError::OutsideScope));
        assert_eq!(TenantContext::require(), Err(TenantError::OutsideScope));
    }

    #[tokio::test]
    async fn require_fails_closed_until_resolved() {
        TenantContext::scope(async {
            assert_eq!(TenantContext::require(), Err(TenantError::Unresolved));
            TenantContext::set_tenant_id(tid(9)).unwrap();
            assert_eq!(TenantContext::require().unwrap().id(), tid(9));
            TenantContext::clear();
            assert_eq!(TenantContext::require(), Err(TenantError::Unresolved));
        })
        .await;
    }

    #[tokio::test]
    async fn guard_clears_on_error_path() {
        async fn failing_request() -> Result<(), String> {
            let _guard = TenantContext::enter(tid(7)).map_err(|e| e.to_string())?;
            assert!(TenantContext::has_tenant());
            Err("business logic failed".to_string())
        }

        TenantContext::scope(async {
            assert!(failing_request().await.is_err());
            assert!(!TenantContext::has_tenant());
            assert_eq!(TenantContext::state(), Some(TenantState::Cleared));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn guard_clears_when_the_future_is_dropped() {
        TenantContext::scope(async {
            let stalled = async {
                let _guard = TenantContext::enter(tid(7)).unwrap();
                assert!(TenantContext::has_tenant());
                std::future::pending::<()>().await;
            };

            let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), stalled).await;
            assert!(timed_out.is_err());
            assert!(!TenantContext::has_tenant());
            assert_eq!(TenantContext::state(), Some(TenantState::Cleared));
        })
        .await;
    }

    #[test]
    fn guard_clears_on_panic() {
        TenantContext::sync_scope(|| {
            let result = std::panic::catch_unwind(|| {
                let _guard = TenantContext::enter(tid(3)).unwrap();
                panic!("handler panicked");
            });
            assert!(result.is_err());
            assert!(!TenantContext::has_tenant());
        });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_units_of_work_are_isolated() {
        let mut handles = Vec::new();
        for id in 1..=64 {
            handles.push(tokio::spawn(async move {
                TenantContext::with_tenant(tid(id), async move {
                    for _ in 0..5 {
                        tokio::task::yield_now().await;
                        assert_eq!(TenantContext::tenant_id(), Some(tid(id)));
                    }
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn spawned_tasks_do_not_inherit_tenant() {
        let seen = TenantContext::with_tenant(tid(42), async {
            let spawned = tokio::spawn(async { TenantContext::tenant_id() }).await.unwrap();
            let blocking = tokio::task::spawn_blocking(TenantContext::tenant_id).await.unwrap();
            (spawned, blocking)
        })
        .await
        .unwrap();
        assert_eq!(seen, (None, None));
    }

    #[test]
    fn reused_thread_never_sees_previous_tenant() {
        let (tx, rx) = std::sync::mpsc::channel::<Box<dyn FnOnce() + Send>>();
        let observed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let worker = std::thread::spawn(move || {
            for job in rx {
                job();
            }
        });

        // First unit of work sets a tenant and forgets to clear it.
        tx.send(Box::new(|| {
            TenantContext::sync_scope(|| {
                TenantContext::set_tenant_id(tid(42)).unwrap();
            })
        }))
        .unwrap();

        let sink = observed.clone();
        tx.send(Box::new(move || {
            let seen = TenantContext::sync_scope(TenantContext::tenant_id);
            sink.lock().unwrap().push(seen);
        }))
        .unwrap();

        drop(tx);
        worker.join().unwrap();
        assert_eq!(*observed.lock().unwrap(), vec![None]);
    }

    #[test]
    fn maintenance_scope_carries_no_tenant() {
        let scope = MaintenanceScope::begin("audit-archive");
        assert_eq!(scope.job(), "audit-archive");
        assert_eq!(TenantContext::tenant_id(), None);
    }
}
