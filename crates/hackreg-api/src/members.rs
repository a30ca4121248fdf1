//! Handlers for `/members` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/members/count` | `{"members": <n>}` |
//! | `GET`  | `/members/count/advanced` | total plus per-term-kind breakdown |

use axum::{extract::State, Json};
use hackreg_core::service::{MemberCounts, MembershipService};
use hackreg_core::store::RegistryStore;
use serde_json::{json, Value};

use crate::{ApiError, ApiState};

/// `GET /members/count`
pub async fn count<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Value>, ApiError>
where
  S: RegistryStore,
{
  let service =
    MembershipService::new(state.store.as_ref(), state.groups.clone());
  let counts = service
    .member_counts()
    .await
    .map_err(|e| ApiError::Service(Box::new(e)))?;
  Ok(Json(json!({ "members": counts.members })))
}

/// `GET /members/count/advanced`
pub async fn count_advanced<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<MemberCounts>, ApiError>
where
  S: RegistryStore,
{
  let service =
    MembershipService::new(state.store.as_ref(), state.groups.clone());
  let counts = service
    .member_counts()
    .await
    .map_err(|e| ApiError::Service(Box::new(e)))?;
  Ok(Json(counts))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{body::Body, http::Request};
  use chrono::{Duration, Utc};
  use hackreg_core::{
    membership::{Membership, TermKind},
    service::WellKnownGroups,
    store::{NewTerm, RegistryStore as _},
  };
  use hackreg_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use crate::api_router;

  async fn seeded_store() -> SqliteStore {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let today = Utc::now().date_naive();

    for (handle, kind) in
      [("ada", TermKind::Regular), ("zoe", TermKind::Remote)]
    {
      let person = s.add_person(handle).await.unwrap();
      s.put_membership(&Membership::new(person.person_id, handle))
        .await
        .unwrap();
      s.add_term(NewTerm {
        person_id: person.person_id,
        start:     today - Duration::days(30),
        end:       None,
        kind,
      })
      .await
      .unwrap();
    }

    // An expired membership must not count.
    let old = s.add_person("old").await.unwrap();
    s.put_membership(&Membership::new(old.person_id, "old"))
      .await
      .unwrap();
    s.add_term(NewTerm {
      person_id: old.person_id,
      start:     today - Duration::days(365),
      end:       Some(today - Duration::days(10)),
      kind:      TermKind::Regular,
    })
    .await
    .unwrap();

    s
  }

  async fn get_json(store: SqliteStore, uri: &str) -> serde_json::Value {
    let router = api_router(Arc::new(store), WellKnownGroups::default());
    let response = router
      .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert!(response.status().is_success());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn count_returns_current_member_total() {
    let store = seeded_store().await;
    let body = get_json(store, "/members/count").await;
    assert_eq!(body, serde_json::json!({ "members": 2 }));
  }

  #[tokio::test]
  async fn advanced_count_breaks_down_by_kind() {
    let store = seeded_store().await;
    let body = get_json(store, "/members/count/advanced").await;
    assert_eq!(body["members"], 2);
    assert_eq!(body["by_kind"]["regular"], 1);
    assert_eq!(body["by_kind"]["remote"], 1);
  }

  #[tokio::test]
  async fn empty_store_counts_zero() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let body = get_json(store, "/members/count").await;
    assert_eq!(body["members"], 0);
  }
}
