//! HTTP route handlers.
//!
//! The execute endpoint is the engine's front door; the rest is the
//! conventional service surface: auth, owner-scoped workflow and
//! credential CRUD, and a health check.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use sentflow_core::WorkflowEngine;
use sentflow_workflow::WorkflowPayload;

use crate::auth::{hash_password, verify_password, CurrentUser};
use crate::config::AppState;
use crate::error::ApiError;
use crate::store::{StoredCredential, StoredWorkflow, User};

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(execute_workflow))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/workflows", get(list_workflows).post(create_workflow))
        .route("/workflows/:id", get(get_workflow).delete(delete_workflow))
        .route("/credentials", get(list_credentials).post(create_credential))
        .route("/credentials/:id", get(get_credential))
        .route("/healthz", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Execute
// ============================================================================

/// POST /execute
///
/// Validate the payload, drive the engine to completion, and return the
/// full per-node result map. Node-level failures are part of the result,
/// not an HTTP error.
async fn execute_workflow(
    State(state): State<AppState>,
    Json(payload): Json<WorkflowPayload>,
) -> Result<Json<Value>, ApiError> {
    let engine = WorkflowEngine::new(payload, state.registry.clone(), state.http_client.clone())?;
    let results = engine.run().await;

    Ok(Json(json!({ "status": "success", "results": results })))
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

fn user_read(user: &User) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "full_name": user.full_name,
        "is_active": user.is_active,
    })
}

/// POST /auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if !body.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        email: body.email,
        full_name: body.full_name,
        password_hash: hash_password(&body.password)?,
        is_active: true,
    };

    let user = state.users.insert(user).await?;
    info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(user_read(&user))))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .users
        .find_by_email(&body.email)
        .await
        .filter(|user| verify_password(&body.password, &user.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("Incorrect email or password".to_string()))?;

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let token = state.auth.issue_token(user.id)?;

    Ok(Json(json!({
        "access_token": token,
        "token_type": "bearer",
    })))
}

// ============================================================================
// Workflows
// ============================================================================

#[derive(Debug, Deserialize)]
struct WorkflowCreate {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_active: bool,
    data: WorkflowPayload,
}

fn workflow_read(workflow: &StoredWorkflow) -> Value {
    json!({
        "id": workflow.id,
        "owner_id": workflow.owner_id,
        "name": workflow.name,
        "description": workflow.description,
        "is_active": workflow.is_active,
        "data": workflow.data,
        "created_at": workflow.created_at,
        "updated_at": workflow.updated_at,
    })
}

/// POST /workflows
async fn create_workflow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<WorkflowCreate>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    body.data.validate()?;

    let workflow = state
        .workflows
        .insert(StoredWorkflow {
            id: Uuid::new_v4(),
            owner_id: user.id,
            name: body.name,
            description: body.description,
            is_active: body.is_active,
            data: body.data,
            created_at: Utc::now(),
            updated_at: None,
        })
        .await;

    Ok((StatusCode::CREATED, Json(workflow_read(&workflow))))
}

/// GET /workflows
async fn list_workflows(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Value> {
    let workflows = state.workflows.list(user.id).await;
    Json(Value::Array(workflows.iter().map(workflow_read).collect()))
}

/// GET /workflows/:id
async fn get_workflow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let workflow = state
        .workflows
        .get(user.id, id)
        .await
        .ok_or(ApiError::NotFound("Workflow"))?;
    Ok(Json(workflow_read(&workflow)))
}

/// DELETE /workflows/:id
async fn delete_workflow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.workflows.delete(user.id, id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Workflow"))
    }
}

// ============================================================================
// Credentials
// ============================================================================

#[derive(Debug, Deserialize)]
struct CredentialCreate {
    name: String,
    #[serde(rename = "type")]
    credential_type: String,
    data: Value,
}

fn credential_read(credential: &StoredCredential) -> Value {
    json!({
        "id": credential.id,
        "owner_id": credential.owner_id,
        "name": credential.name,
        "type": credential.credential_type,
        "created_at": credential.created_at,
    })
}

/// POST /credentials
async fn create_credential(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CredentialCreate>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let plaintext = body.data.to_string();
    let encrypted = state.cipher.encrypt(&plaintext)?;

    let credential = state
        .credentials
        .insert(StoredCredential {
            id: Uuid::new_v4(),
            owner_id: user.id,
            name: body.name,
            credential_type: body.credential_type,
            encrypted_data: encrypted,
            created_at: Utc::now(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(credential_read(&credential))))
}

/// GET /credentials
async fn list_credentials(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Value> {
    let credentials = state.credentials.list(user.id).await;
    Json(Value::Array(
        credentials.iter().map(credential_read).collect(),
    ))
}

/// GET /credentials/:id
async fn get_credential(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let credential = state
        .credentials
        .get(user.id, id)
        .await
        .ok_or(ApiError::NotFound("Credential"))?;
    Ok(Json(credential_read(&credential)))
}

// ============================================================================
// Health
// ============================================================================

/// GET /healthz
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
