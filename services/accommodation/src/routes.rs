//! Accommodation service routes

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{FromRequest, Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::{
    error::{AccommodationError, ApiError, ApiResult},
    middleware::{AuthUser, JwtVerifier, auth_middleware},
    models::{CreatePropertyRequest, SubmitRequest, UpdateSettings},
    queue::QueueQuery,
    state::AppState,
};

/// JSON body whose rejections answer with the API error body
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Deserialize)]
pub struct AssignPayload {
    pub property_id: i64,
    pub room_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentPayload {
    pub payment_status: String,
}

#[derive(Debug, Deserialize)]
pub struct RoomPayload {
    pub room_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckedInPayload {
    pub checked_in: bool,
    /// Required when undoing a check-in
    #[serde(default)]
    pub confirm: bool,
}

/// Scanned participant QR code
#[derive(Debug, Deserialize)]
pub struct CheckInPayload {
    pub participant_id: String,
}

/// Create the router for the accommodation service
pub fn create_router(state: AppState, verifier: Arc<JwtVerifier>) -> Router {
    let protected_routes = api_routes()
        .route_layer(middleware::from_fn_with_state(verifier, auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Routes that expect an [`AuthUser`] in the request extensions
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .route(
            "/accommodation/properties",
            get(list_properties).post(create_property),
        )
        .route(
            "/accommodation/properties/:id",
            axum::routing::delete(delete_property),
        )
        .route(
            "/accommodation/requests",
            get(list_requests).post(submit_request),
        )
        .route("/accommodation/requests/me", get(my_request))
        .route(
            "/accommodation/requests/:id",
            axum::routing::delete(delete_request),
        )
        .route("/accommodation/requests/:id/options", get(request_options))
        .route("/accommodation/requests/:id/assign", post(assign_request))
        .route("/accommodation/requests/:id/status", put(change_status))
        .route("/accommodation/requests/:id/payment", put(set_payment_status))
        .route("/accommodation/requests/:id/room", put(set_room_number))
        .route("/accommodation/requests/:id/checked-in", put(set_checked_in))
        .route("/accommodation/check-in", post(check_in_participant))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        None => "memory",
        Some(pool) => match common::database::health_check(pool).await {
            Ok(true) => "ok",
            Ok(false) => "unavailable",
            Err(e) => {
                error!("Database health check failed: {}", e);
                "unavailable"
            }
        },
    };

    let status = if database == "unavailable" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "accommodation",
            "database": database,
        })),
    )
}

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.settings().await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<UpdateSettings>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_admin(&user)?;
    Ok(Json(state.service.update_settings(&payload).await?))
}

/// Inventory with free beds, for the desk and administrators
pub async fn list_properties(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_desk(&user)?;
    Ok(Json(state.service.list_properties().await?))
}

pub async fn create_property(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreatePropertyRequest>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_admin(&user)?;
    let property = state.service.create_property(payload).await?;

    Ok((StatusCode::CREATED, Json(property)))
}

pub async fn delete_property(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_admin(&user)?;
    state.service.delete_property(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Request queue with search, filters and statistics
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_desk(&user)?;
    Ok(Json(state.service.queue(&query).await?))
}

pub async fn submit_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<SubmitRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = state.service.submit_request(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn my_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.my_request(user.id).await?))
}

pub async fn request_options(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_desk(&user)?;
    Ok(Json(state.service.options_for(id).await?))
}

/// Assign a property; a lost race answers with the refreshed options
pub async fn assign_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<AssignPayload>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_admin(&user)?;

    match state
        .service
        .assign(id, payload.property_id, payload.room_number.as_deref())
        .await
    {
        Ok(assignment) => Ok(Json(assignment)),
        Err(AccommodationError::CapacityExceeded { property_id }) => {
            let options = state.service.options_for(id).await?;
            Err(ApiError::CapacityExceeded {
                property_id,
                options,
            })
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn change_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<StatusPayload>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_admin(&user)?;
    Ok(Json(state.service.change_status(id, &payload.status).await?))
}

pub async fn set_payment_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<PaymentPayload>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_admin(&user)?;
    let request = state
        .service
        .set_payment_status(id, &payload.payment_status)
        .await?;

    Ok(Json(request))
}

pub async fn set_room_number(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<RoomPayload>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_admin(&user)?;
    let request = state
        .service
        .set_room_number(id, payload.room_number.as_deref())
        .await?;

    Ok(Json(request))
}

pub async fn set_checked_in(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<CheckedInPayload>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.access.require_desk(&user)?;
    if !payload.checked_in {
        state.access.require_admin(&user)?;
    }
    let request = state
        .service
        .set_checked_in(actor, id, payload.checked_in, payload.confirm)
        .await?;

    Ok(Json(request))
}

pub async fn check_in_participant(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CheckInPayload>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.access.require_desk(&user)?;
    let request = state
        .service
        .check_in_participant(actor, &payload.participant_id)
        .await?;

    Ok(Json(request))
}

pub async fn delete_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.access.require_admin(&user)?;
    let released = state.service.delete_request(id).await?;

    Ok(Json(json!({
        "deleted": id,
        "released_property_id": released,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::{PortalSettings, UserProfile};
    use crate::repositories::{MemoryStore, SettingsStore};
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct TestApp {
        store: MemoryStore,
        state: AppState,
    }

    impl TestApp {
        async fn new() -> Self {
            let store = MemoryStore::new();
            SettingsStore::save(
                &store,
                &PortalSettings {
                    accommodation_open: true,
                    check_in_open: true,
                },
            )
            .await
            .unwrap();
            let state = AppState::in_memory(store.clone(), &AppConfig::default());

            Self { store, state }
        }

        fn router_as(&self, roles: &[&str]) -> Router {
            let user = AuthUser {
                id: Uuid::new_v4(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
            };
            self.router_for(user)
        }

        fn router_for(&self, user: AuthUser) -> Router {
            api_routes()
                .layer(Extension(user))
                .with_state(self.state.clone())
        }

        async fn participant(&self, name: &str) -> AuthUser {
            let id = Uuid::new_v4();
            self.store
                .insert_user(UserProfile {
                    id,
                    name: name.to_string(),
                    gender: None,
                    participant_id: format!("RU-{}", name.to_uppercase()),
                    phone: None,
                })
                .await;
            AuthUser {
                id,
                roles: vec!["user".to_string()],
            }
        }
    }

    async fn send(
        router: Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn hostel(name: &str, gender: &str, capacity: i32) -> Value {
        json!({
            "name": name,
            "type": "Hostel",
            "gender": gender,
            "capacity": capacity,
            "cost_price": 300,
            "selling_price": 450,
            "contact_phone": "+91 98765-43210",
        })
    }

    #[tokio::test]
    async fn test_health_reports_memory_backend() {
        let app = TestApp::new().await;
        let router = Router::new()
            .route("/health", get(health_check))
            .with_state(app.state.clone());

        let (status, body) = send(router, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "memory");
    }

    #[tokio::test]
    async fn test_booking_and_assignment_flow() {
        let app = TestApp::new().await;
        let admin = app.router_as(&["admin"]);

        let (status, property) = send(
            admin.clone(),
            Method::POST,
            "/accommodation/properties",
            Some(hostel("Shanti Nivas", "Girls", 1)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(property["type"], "Hostel");
        let property_id = property["id"].as_i64().unwrap();

        let guest = app.participant("Lakshmi").await;
        let (status, request) = send(
            app.router_for(guest.clone()),
            Method::POST,
            "/accommodation/requests",
            Some(json!({ "gender": "Female" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(request["nights"], 1);
        let request_id = request["id"].as_i64().unwrap();

        let (status, options) = send(
            app.router_as(&["volunteer"]),
            Method::GET,
            &format!("/accommodation/requests/{}/options", request_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(options[0]["gender"], "Girls");
        assert_eq!(options[0]["available_beds"], 1);
        assert_eq!(options[0]["selectable"], true);

        let (status, assignment) = send(
            admin.clone(),
            Method::POST,
            &format!("/accommodation/requests/{}/assign", request_id),
            Some(json!({ "property_id": property_id, "room_number": "G-4" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(assignment["property"]["occupied"], 1);
        assert_eq!(assignment["request"]["status"], "approved");

        let (status, mine) = send(
            app.router_for(guest),
            Method::GET,
            "/accommodation/requests/me",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine["property_name"], "Shanti Nivas");
        assert_eq!(mine["room_number"], "G-4");
    }

    #[tokio::test]
    async fn test_full_property_answers_conflict_with_options() {
        let app = TestApp::new().await;
        let admin = app.router_as(&["admin"]);

        let (_, full) = send(
            admin.clone(),
            Method::POST,
            "/accommodation/properties",
            Some(hostel("Single Room", "Co-ed", 1)),
        )
        .await;
        let (_, spare) = send(
            admin.clone(),
            Method::POST,
            "/accommodation/properties",
            Some(hostel("Dormitory", "Boys", 20)),
        )
        .await;
        let full_id = full["id"].as_i64().unwrap();

        let mut request_ids = Vec::new();
        for name in ["Ravi", "Suresh"] {
            let user = app.participant(name).await;
            let (_, request) = send(
                app.router_for(user),
                Method::POST,
                "/accommodation/requests",
                Some(json!({ "gender": "Male" })),
            )
            .await;
            request_ids.push(request["id"].as_i64().unwrap());
        }

        let (status, _) = send(
            admin.clone(),
            Method::POST,
            &format!("/accommodation/requests/{}/assign", request_ids[0]),
            Some(json!({ "property_id": full_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            admin,
            Method::POST,
            &format!("/accommodation/requests/{}/assign", request_ids[1]),
            Some(json!({ "property_id": full_id })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "capacity_exceeded");
        let options = body["options"].as_array().unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0]["selectable"], false);
        assert_eq!(options[1]["id"], spare["id"]);
        assert_eq!(options[1]["selectable"], true);
    }

    #[tokio::test]
    async fn test_roles_are_enforced() {
        let app = TestApp::new().await;

        let (status, _) = send(
            app.router_as(&["volunteer"]),
            Method::DELETE,
            "/accommodation/properties/1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            app.router_as(&["user"]),
            Method::GET,
            "/accommodation/requests",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");

        let (status, _) = send(
            app.router_as(&["volunteer"]),
            Method::PUT,
            "/settings",
            Some(json!({ "check_in_open": false })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, settings) =
            send(app.router_as(&["user"]), Method::GET, "/settings", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settings["check_in_open"], true);
    }

    #[tokio::test]
    async fn test_queue_rejects_unknown_status_filter() {
        let app = TestApp::new().await;

        let (status, body) = send(
            app.router_as(&["volunteer"]),
            Method::GET,
            "/accommodation/requests?status=archived",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_volunteer_cannot_undo_check_in() {
        let app = TestApp::new().await;
        let admin = app.router_as(&["admin"]);
        let (_, property) = send(
            admin.clone(),
            Method::POST,
            "/accommodation/properties",
            Some(hostel("Annex", "Co-ed", 5)),
        )
        .await;
        let guest = app.participant("Omkar").await;
        let (_, request) = send(
            app.router_for(guest),
            Method::POST,
            "/accommodation/requests",
            Some(json!({ "gender": "Male" })),
        )
        .await;
        let request_id = request["id"].as_i64().unwrap();
        send(
            admin.clone(),
            Method::POST,
            &format!("/accommodation/requests/{}/assign", request_id),
            Some(json!({ "property_id": property["id"] })),
        )
        .await;

        let (status, checked) = send(
            app.router_as(&["volunteer"]),
            Method::POST,
            "/accommodation/check-in",
            Some(json!({ "participant_id": "RU-OMKAR" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(checked["checked_in"], true);

        let (status, body) = send(
            app.router_as(&["volunteer"]),
            Method::PUT,
            &format!("/accommodation/requests/{}/checked-in", request_id),
            Some(json!({ "checked_in": false, "confirm": true })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");

        let (status, undone) = send(
            admin,
            Method::PUT,
            &format!("/accommodation/requests/{}/checked-in", request_id),
            Some(json!({ "checked_in": false, "confirm": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(undone["checked_in"], false);
    }

    #[tokio::test]
    async fn test_malformed_body_answers_with_error_json() {
        let app = TestApp::new().await;

        let (status, body) = send(
            app.router_as(&["admin"]),
            Method::POST,
            "/accommodation/properties",
            Some(json!({ "type": "Hostel", "capacity": 3 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad_request");
        assert!(body["error"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn test_room_number_is_set_and_cleared() {
        let app = TestApp::new().await;
        let admin = app.router_as(&["admin"]);
        let guest = app.participant("Tara").await;
        let (_, request) = send(
            app.router_for(guest.clone()),
            Method::POST,
            "/accommodation/requests",
            Some(json!({ "gender": "Female" })),
        )
        .await;
        let uri = format!("/accommodation/requests/{}/room", request["id"]);

        let (status, updated) = send(
            admin.clone(),
            Method::PUT,
            &uri,
            Some(json!({ "room_number": " 3-C " })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["room_number"], "3-C");

        let (status, cleared) = send(
            admin,
            Method::PUT,
            &uri,
            Some(json!({ "room_number": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared["room_number"], Value::Null);

        let (_, mine) = send(
            app.router_for(guest),
            Method::GET,
            "/accommodation/requests/me",
            None,
        )
        .await;
        assert_eq!(mine["room_number"], Value::Null);
    }

    #[tokio::test]
    async fn test_checked_in_request_cannot_be_rejected() {
        let app = TestApp::new().await;
        let admin = app.router_as(&["admin"]);
        let (_, property) = send(
            admin.clone(),
            Method::POST,
            "/accommodation/properties",
            Some(hostel("Lake View", "Co-ed", 1)),
        )
        .await;
        let guest = app.participant("Ishaan").await;
        let (_, request) = send(
            app.router_for(guest),
            Method::POST,
            "/accommodation/requests",
            Some(json!({ "gender": "Male" })),
        )
        .await;
        let request_id = request["id"].as_i64().unwrap();
        send(
            admin.clone(),
            Method::POST,
            &format!("/accommodation/requests/{}/assign", request_id),
            Some(json!({ "property_id": property["id"] })),
        )
        .await;
        send(
            admin.clone(),
            Method::PUT,
            &format!("/accommodation/requests/{}/checked-in", request_id),
            Some(json!({ "checked_in": true })),
        )
        .await;

        let (status, body) = send(
            admin.clone(),
            Method::PUT,
            &format!("/accommodation/requests/{}/status", request_id),
            Some(json!({ "status": "rejected" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "invalid_state");

        let (_, properties) = send(admin, Method::GET, "/accommodation/properties", None).await;
        assert_eq!(properties[0]["occupied"], 1);
    }
}
