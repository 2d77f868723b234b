use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use shared::*;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;
use uuid::Uuid;
use crate::auth::AuthenticatedUser;
use crate::services::BookingCore;

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<BookingCore>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub partner_id: Option<Uuid>,
    pub seats: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    pub reserve: Reservation,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancel: Reservation,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

#[derive(Debug, Serialize)]
pub struct EventSummaryResponse {
    pub event: Event,
}

#[derive(Debug, Serialize)]
pub struct ReservationsResponse {
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<(StatusCode, Json<T>), ApiError>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/event/all", get(all_events))
        .route("/api/event/reserve/:event_id", post(reserve))
        .route("/api/event/cancel/:reservation_id", delete(cancel_reservation))
        .route("/api/event/reservations-by-user", get(reservations_by_user))
        .route("/api/event/summary/:event_id", get(event_summary))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn all_events(State(state): State<AppState>) -> ApiResult<EventsResponse> {
    let events = state.core.list_events().await.map_err(booking_error)?;
    Ok((StatusCode::OK, Json(EventsResponse { events })))
}

pub async fn reserve(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    event_id: Result<Path<Uuid>, PathRejection>,
    request: Result<Json<ReserveRequest>, JsonRejection>,
) -> ApiResult<ReserveResponse> {
    let Path(event_id) = event_id.map_err(|_| bad_request("Invalid event ID"))?;
    let (partner_id, seats) = match request {
        Ok(Json(ReserveRequest {
            partner_id: Some(partner_id),
            seats: Some(seats),
        })) => (partner_id, seats),
        _ => return Err(bad_request("Missing required fields")),
    };

    let reservation = state
        .core
        .reserve_seats(event_id, user.user_id, partner_id, seats)
        .await
        .map_err(booking_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ReserveResponse {
            reserve: reservation,
            status: "confirmed".to_string(),
        }),
    ))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    reservation_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<CancelResponse> {
    let Path(reservation_id) = reservation_id.map_err(|_| bad_request("Invalid reservation ID"))?;
    let cancel = state
        .core
        .cancel_reservation(reservation_id)
        .await
        .map_err(booking_error)?;
    Ok((StatusCode::OK, Json(CancelResponse { cancel })))
}

pub async fn reservations_by_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<ReservationsResponse> {
    let reservations = state
        .core
        .list_reservations_for_user(user.user_id)
        .await
        .map_err(booking_error)?;
    Ok((StatusCode::OK, Json(ReservationsResponse { reservations })))
}

pub async fn event_summary(
    State(state): State<AppState>,
    event_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<EventSummaryResponse> {
    let Path(event_id) = event_id.map_err(|_| bad_request("Invalid event ID"))?;
    let event = state.core.get_event(event_id).await.map_err(booking_error)?;
    Ok((StatusCode::OK, Json(EventSummaryResponse { event })))
}

pub async fn health_check() -> &'static str {
    "OK"
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn booking_error(err: BookingError) -> ApiError {
    let status = match &err {
        BookingError::InvalidRequest(_) | BookingError::InsufficientInventory { .. } => StatusCode::BAD_REQUEST,
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::StaleVersion(_) => StatusCode::CONFLICT,
        BookingError::Integrity(_) | BookingError::StorageUnavailable(_) => {
            error!("Request failed: {:#}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal Server Error".to_string(),
                }),
            );
        }
    };
    (status, Json(ErrorResponse { error: err.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::USER_ID_HEADER;
    use crate::memory_store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn event(name: &str, available_seats: i32) -> Event {
        Event {
            event_id: Uuid::new_v4(),
            name: name.to_string(),
            capacity: available_seats,
            available_seats,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn app(events: Vec<Event>) -> Router {
        let store = Arc::new(MemoryStore::with_events(events));
        create_router(AppState {
            core: Arc::new(BookingCore::new(store)),
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn reserve_request(event_id: Uuid, user_id: Uuid, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/event/reserve/{}", event_id))
            .header(USER_ID_HEADER, user_id.to_string())
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn cancel_request(reservation_id: &str, user_id: Uuid) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/event/cancel/{}", reservation_id))
            .header(USER_ID_HEADER, user_id.to_string())
            .body(Body::empty())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn reserve_then_cancel_over_http() {
        let e1 = event("E1", 5);
        let app = app(vec![e1.clone()]);
        let user = Uuid::new_v4();
        let partner = Uuid::new_v4();

        let (status, body) = send(&app, reserve_request(e1.event_id, user, json!({"partner_id": partner, "seats": 3}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "confirmed");
        assert_eq!(body["reserve"]["seats"], 3);
        assert_eq!(body["reserve"]["user_id"], user.to_string());
        let reservation_id = body["reserve"]["reservation_id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get(&format!("/api/event/summary/{}", e1.event_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["event"]["available_seats"], 2);
        assert_eq!(body["event"]["version"], 1);

        let (status, body) = send(&app, cancel_request(&reservation_id, user)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cancel"]["reservation_id"], reservation_id.as_str());

        let (status, _) = send(&app, cancel_request(&reservation_id, user)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reserve_requires_caller_identity() {
        let e1 = event("E1", 5);
        let app = app(vec![e1.clone()]);
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/event/reserve/{}", e1.event_id))
            .header("content-type", "application/json")
            .body(Body::from(json!({"partner_id": Uuid::new_v4(), "seats": 1}).to_string()))
            .unwrap();

        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_before_the_core() {
        let e1 = event("E1", 5);
        let app = app(vec![e1.clone()]);
        let user = Uuid::new_v4();

        for body in [json!({"seats": 2}), json!({"partner_id": Uuid::new_v4()}), json!("not an object")] {
            let (status, response) = send(&app, reserve_request(e1.event_id, user, body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(response["error"], "Missing required fields");
        }

        let (status, body) = send(&app, get(&format!("/api/event/summary/{}", e1.event_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["event"]["version"], 0);
    }

    #[tokio::test]
    async fn core_failures_map_to_status_codes() {
        let e1 = event("E1", 2);
        let app = app(vec![e1.clone()]);
        let user = Uuid::new_v4();
        let partner = Uuid::new_v4();

        let (status, body) = send(&app, reserve_request(e1.event_id, user, json!({"partner_id": partner, "seats": 11}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid seat count"));

        let (status, body) = send(&app, reserve_request(e1.event_id, user, json!({"partner_id": partner, "seats": 3}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not enough seats"));

        let (status, _) = send(&app, reserve_request(Uuid::new_v4(), user, json!({"partner_id": partner, "seats": 1}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get("/api/event/summary/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, cancel_request("not-a-uuid", user)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listings_return_events_and_caller_reservations() {
        let e1 = event("Bravo", 5);
        let e2 = event("Alpha", 5);
        let app = app(vec![e1.clone(), e2.clone()]);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        send(&app, reserve_request(e1.event_id, alice, json!({"partner_id": Uuid::new_v4(), "seats": 1}))).await;
        send(&app, reserve_request(e2.event_id, bob, json!({"partner_id": Uuid::new_v4(), "seats": 2}))).await;

        let (status, body) = send(&app, get("/api/event/all")).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["events"].as_array().unwrap().iter().map(|e| e["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Alpha", "Bravo"]);

        let request = Request::builder()
            .uri("/api/event/reservations-by-user")
            .header(USER_ID_HEADER, alice.to_string())
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let reservations = body["reservations"].as_array().unwrap();
        assert_eq!(reservations.len(), 1);
        assert_eq!(reservations[0]["event_id"], e1.event_id.to_string());
    }

    #[tokio::test]
    async fn health_check_responds() {
        let app = app(Vec::new());
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn stale_version_is_a_conflict_and_server_faults_are_opaque() {
        let (status, Json(body)) = booking_error(BookingError::StaleVersion("Event already updated by another request".into()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "Event already updated by another request");

        let (status, Json(body)) = booking_error(BookingError::StorageUnavailable(anyhow::anyhow!("pool timed out")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal Server Error");

        let (status, _) = booking_error(BookingError::Integrity("event cannot take back seats".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
