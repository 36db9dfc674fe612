//! Lifecycle-scoped loading.
//!
//! A [`ViewScope`] stands for one open screen. Loads spawned through it write
//! their outcome into a [`Slot`] of their own; once the scope is closed (or
//! dropped) every late completion is discarded instead of written.

use futures::future::join_all;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{admin, ApiError};
use crate::client::ApiClient;
use crate::models::User;
use crate::stats::AdminKpis;

/// State of one remote read.
#[derive(Debug, Default)]
pub enum Loadable<T> {
    #[default]
    Idle,
    Loading,
    Ready(T),
    Failed(ApiError),
}

impl<T> Loadable<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Loadable::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }
}

/// Shared cell one load writes its result into.
#[derive(Debug)]
pub struct Slot<T> {
    state: Arc<Mutex<Loadable<T>>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(Loadable::Idle)),
        }
    }
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&Loadable<T>) -> R) -> R {
        f(&self.state.lock())
    }

    /// Move the current state out, leaving `Idle` behind.
    pub fn take(&self) -> Loadable<T> {
        std::mem::take(&mut *self.state.lock())
    }

    fn set(&self, state: Loadable<T>) {
        *self.state.lock() = state;
    }
}

/// Lifecycle of one screen. Closing it (or dropping it) cancels pending loads.
#[derive(Debug)]
pub struct ViewScope {
    cancel: CancellationToken,
    // Held while a load commits its result, and by `close`, so that nothing
    // is written once `close` has returned.
    commit: Arc<Mutex<()>>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            commit: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn close(&self) {
        let _commit = self.commit.lock();
        self.cancel.cancel();
    }

    /// Run `load` on the runtime and store its outcome in `slot`.
    ///
    /// The slot is marked `Loading` immediately. If the scope closes first the
    /// future is abandoned and the slot is left as it was.
    pub fn spawn<T, F>(&self, slot: &Slot<T>, load: F) -> JoinHandle<()>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        if !self.is_closed() {
            slot.set(Loadable::Loading);
        }
        let slot = slot.clone();
        let cancel = self.cancel.clone();
        let commit = Arc::clone(&self.commit);

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("View closed before load finished");
                    return;
                }
                outcome = load => outcome,
            };

            let _commit = commit.lock();
            if cancel.is_cancelled() {
                debug!("Discarding load result for closed view");
                return;
            }
            slot.set(match outcome {
                Ok(value) => Loadable::Ready(value),
                Err(e) => {
                    warn!(error = %e, "Load failed");
                    Loadable::Failed(e)
                }
            });
        })
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.close();
    }
}

/// Wait for spawned loads, ignoring tasks that were cancelled or panicked.
pub async fn settle(handles: Vec<JoinHandle<()>>) {
    for result in join_all(handles).await {
        if let Err(e) = result {
            warn!(error = %e, "Load task did not complete");
        }
    }
}

/// The admin dashboard: full user list and pending approvals, loaded in
/// parallel into separate slots.
#[derive(Debug, Default)]
pub struct AdminDashboard {
    pub users: Slot<Vec<User>>,
    pub pending: Slot<Vec<User>>,
}

impl AdminDashboard {
    pub async fn load(scope: &ViewScope, client: &ApiClient) -> Self {
        let dashboard = Self::default();
        let users = {
            let client = client.clone();
            scope.spawn(&dashboard.users, async move { admin::list_users(&client).await })
        };
        let pending = {
            let client = client.clone();
            scope.spawn(&dashboard.pending, async move {
                admin::pending_users(&client).await
            })
        };
        settle(vec![users, pending]).await;
        dashboard
    }

    /// KPIs, once both lists have arrived.
    pub fn kpis(&self) -> Option<AdminKpis> {
        self.users.with(|users| {
            self.pending.with(|pending| {
                Some(AdminKpis::compute(users.ready()?, pending.ready()?))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock;
    use crate::session::SessionStore;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn client(router: Router) -> ApiClient {
        let base = mock::serve(router).await;
        ApiClient::new(base, SessionStore::in_memory()).unwrap()
    }

    #[tokio::test]
    async fn test_parallel_loads_fill_their_own_slots() {
        let client = client(
            Router::new()
                .route(
                    "/a",
                    get(|| async {
                        tokio::time::sleep(Duration::from_millis(80)).await;
                        Json(json!("a"))
                    }),
                )
                .route("/b", get(|| async { Json(json!("b")) })),
        )
        .await;

        let scope = ViewScope::new();
        let a: Slot<Value> = Slot::new();
        let b: Slot<Value> = Slot::new();
        let ha = {
            let client = client.clone();
            scope.spawn(&a, async move { client.get("/a").await.map_err(ApiError::from) })
        };
        let hb = {
            let client = client.clone();
            scope.spawn(&b, async move { client.get("/b").await.map_err(ApiError::from) })
        };

        hb.await.unwrap();
        assert!(a.with(|s| s.is_loading()));
        assert_eq!(b.with(|s| s.ready().cloned()), Some(json!("b")));

        ha.await.unwrap();
        assert_eq!(a.with(|s| s.ready().cloned()), Some(json!("a")));
        assert_eq!(b.with(|s| s.ready().cloned()), Some(json!("b")));
    }

    #[tokio::test]
    async fn test_closed_scope_discards_late_results() {
        let client = client(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Json(json!(1))
            }),
        ))
        .await;

        let scope = ViewScope::new();
        let slot: Slot<Value> = Slot::new();
        let handle = scope.spawn(&slot, async move { client.get("/slow").await.map_err(ApiError::from) });
        scope.close();
        handle.await.unwrap();

        assert!(scope.is_closed());
        assert!(slot.with(|s| s.is_loading()));
    }

    #[tokio::test]
    async fn test_dropped_scope_discards_late_results() {
        let slot: Slot<u32> = Slot::new();
        let handle = {
            let scope = ViewScope::new();
            scope.spawn(&slot, async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(7)
            })
        };
        handle.await.unwrap();
        assert!(slot.with(|s| s.ready().is_none()));
    }

    #[tokio::test]
    async fn test_failed_load_keeps_error() {
        let client = client(Router::new().route(
            "/boom",
            get(|| async { (StatusCode::FORBIDDEN, Json(json!({"error": "admins only"}))) }),
        ))
        .await;

        let scope = ViewScope::new();
        let slot: Slot<Value> = Slot::new();
        scope
            .spawn(&slot, async move { client.get("/boom").await.map_err(ApiError::from) })
            .await
            .unwrap();

        match slot.take() {
            Loadable::Failed(e) => assert!(e.client_error().unwrap().is_forbidden()),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admin_dashboard_with_reversed_timing() {
        let client = client(
            Router::new()
                .route(
                    "/api/admin/users",
                    get(|| async {
                        tokio::time::sleep(Duration::from_millis(60)).await;
                        Json(json!({"users": [
                            {"id": 1, "full_name": "Ada", "email": "a@x", "user_type": "admin",
                             "is_verified": true, "is_approved": true},
                            {"id": 2, "full_name": "Dev", "email": "d@x", "user_type": "driver",
                             "is_verified": true, "is_approved": false}
                        ]}))
                    }),
                )
                .route(
                    "/api/admin/pending-users",
                    get(|| async {
                        Json(json!({"users": [
                            {"id": 2, "full_name": "Dev", "email": "d@x", "user_type": "driver",
                             "is_verified": true, "is_approved": false}
                        ]}))
                    }),
                ),
        )
        .await;

        let scope = ViewScope::new();
        let dashboard = AdminDashboard::load(&scope, &client).await;
        let kpis = dashboard.kpis().unwrap();
        assert_eq!(kpis.total_users, 2);
        assert_eq!(kpis.pending_approvals, 1);
        assert_eq!(kpis.total_drivers, 1);
        assert_eq!(kpis.active_drivers, 0);
    }
}
