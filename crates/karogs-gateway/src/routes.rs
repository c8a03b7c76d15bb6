//! API route handlers for the gateway.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::Datelike;
use serde::Deserialize;

use crate::server::AppState;

/// Years the calendar arithmetic is defined for.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1583..=9999;

/// Health check endpoint. 503 when the subscriber store cannot be read.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let uptime = state.start_time.elapsed().as_secs();
    let timestamp = chrono::Utc::now().to_rfc3339();
    let memory = karogs_core::process::resident_memory_mb().map(|mb| format!("{mb}MB"));

    match state.directory.count().await {
        Ok(count) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "UP",
                "version": env!("CARGO_PKG_VERSION"),
                "components": {
                    "server": { "status": "UP", "details": { "uptime_secs": uptime, "memory": memory } },
                    "storage": { "status": "UP", "details": { "subscriber_count": count } },
                },
                "timestamp": timestamp,
            })),
        ),
        Err(e) => {
            tracing::error!("❌ Health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "DOWN",
                    "version": env!("CARGO_PKG_VERSION"),
                    "components": {
                        "server": { "status": "UP", "details": { "uptime_secs": uptime, "memory": memory } },
                        "storage": { "status": "DOWN", "details": { "error": e.to_string() } },
                    },
                    "timestamp": timestamp,
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

/// All flag days of a year (default: the current local year).
pub async fn list_flag_days(
    State(state): State<Arc<AppState>>,
    Query(query): Query<YearQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    let year = query.year.unwrap_or_else(|| state.registry.today().year());
    if !YEAR_RANGE.contains(&year) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "ok": false,
                "error": format!("year must be between {} and {}", YEAR_RANGE.start(), YEAR_RANGE.end()),
            })),
        );
    }

    let days: Vec<_> = state
        .registry
        .all_flag_days_for_year(year)
        .iter()
        .cloned()
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "year": year,
            "count": days.len(),
            "flag_days": days,
        })),
    )
}

/// The first flag day after now, or 404.
pub async fn next_flag_day(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    match state.registry.next_flag_day() {
        Some(next) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "flag_day": next.flag_day.in_year(next.year),
                "year": next.year,
                "starts_at": next.starts_at.to_rfc3339(),
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "ok": false, "error": "No upcoming flag day" })),
        ),
    }
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Europe::Riga;
    use karogs_calendar::{DynamicDateCalculator, FixedClock, FlagDayRegistry};
    use karogs_core::{ChatId, KarogsError, SubscriberDirectory};
    use karogs_scheduler::InMemoryDirectory;

    struct UnreadableDirectory;

    #[async_trait]
    impl SubscriberDirectory for UnreadableDirectory {
        async fn add(&self, _: ChatId) -> karogs_core::Result<bool> {
            Err(KarogsError::storage("permission denied"))
        }
        async fn remove(&self, _: ChatId) -> karogs_core::Result<bool> {
            Err(KarogsError::storage("permission denied"))
        }
        async fn all(&self) -> karogs_core::Result<Vec<ChatId>> {
            Err(KarogsError::storage("permission denied"))
        }
        async fn is_member(&self, _: ChatId) -> karogs_core::Result<bool> {
            Err(KarogsError::storage("permission denied"))
        }
        async fn count(&self) -> karogs_core::Result<usize> {
            Err(KarogsError::storage("permission denied"))
        }
    }

    pub(crate) fn test_state(directory: Arc<dyn SubscriberDirectory>) -> State<Arc<AppState>> {
        let now = Riga.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap().with_timezone(&Utc);
        let registry = Arc::new(FlagDayRegistry::new(
            Arc::new(DynamicDateCalculator::new()),
            Arc::new(FixedClock::new(now)),
            Riga,
        ));
        State(Arc::new(AppState::new(registry, directory)))
    }

    #[tokio::test]
    async fn test_health_check_up() {
        let state = test_state(Arc::new(InMemoryDirectory::with_members([1, 2, 3])));
        let (status, Json(json)) = health_check(state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "UP");
        assert_eq!(json["components"]["storage"]["details"]["subscriber_count"], 3);
        assert!(json["timestamp"].is_string());
        #[cfg(target_os = "linux")]
        assert!(
            json["components"]["server"]["details"]["memory"]
                .as_str()
                .is_some_and(|m| m.ends_with("MB"))
        );
    }

    #[tokio::test]
    async fn test_health_check_down() {
        let (status, Json(json)) = health_check(test_state(Arc::new(UnreadableDirectory))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "DOWN");
        assert_eq!(json["components"]["storage"]["status"], "DOWN");
    }

    #[tokio::test]
    async fn test_list_flag_days_for_year() {
        let state = test_state(Arc::new(InMemoryDirectory::new()));
        let (status, Json(json)) = list_flag_days(state, Query(YearQuery { year: Some(2024) })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["year"], 2024);
        assert_eq!(json["count"], 13);

        let days = json["flag_days"].as_array().unwrap();
        assert_eq!(days[0]["month"], 3);
        assert_eq!(days[0]["day"], 25);
        assert!(days.iter().all(|d| d["year"] == 2024));
        assert!(days.iter().any(|d| d["type"] == "mourning"));
    }

    #[tokio::test]
    async fn test_list_flag_days_defaults_to_current_year() {
        let state = test_state(Arc::new(InMemoryDirectory::new()));
        let (_, Json(json)) = list_flag_days(state, Query(YearQuery { year: None })).await;
        assert_eq!(json["year"], 2025);
    }

    #[tokio::test]
    async fn test_list_flag_days_rejects_bad_year() {
        let state = test_state(Arc::new(InMemoryDirectory::new()));
        let (status, _) = list_flag_days(state, Query(YearQuery { year: Some(42) })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_next_flag_day() {
        let state = test_state(Arc::new(InMemoryDirectory::new()));
        let (status, Json(json)) = next_flag_day(state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["flag_day"]["month"], 6);
        assert_eq!(json["flag_day"]["day"], 14);
        assert_eq!(json["flag_day"]["type"], "mourning");
        assert_eq!(json["year"], 2025);
        assert!(json["starts_at"].as_str().unwrap().starts_with("2025-06-14T00:00:00+03:00"));
    }

    #[tokio::test]
    async fn test_not_found() {
        assert_eq!(not_found().await, (StatusCode::NOT_FOUND, "Not Found"));
    }
}
