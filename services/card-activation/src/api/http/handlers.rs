//! HTTP 请求处理

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cardgate_errors::{AppError, AppResult};
use cardgate_telemetry::HealthStatus;
use serde::de::DeserializeOwned;

use super::AppState;
use crate::application::commands::{
    CreateCardCommand, CreateCardResult, GetCardStatusQuery, RequestOtpCommand, RequestOtpResult,
    VerifyOtpCommand, VerifyOtpResult,
};
use crate::application::{CommandHandler, QueryHandler};
use crate::domain::services::CardStatus;

/// 请求体解析失败统一返回 400
fn body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AppError::validation(format!("bad request: {}", e.body_text())))
}

pub async fn create_card(
    State(state): State<AppState>,
    payload: Result<Json<CreateCardCommand>, JsonRejection>,
) -> AppResult<Json<CreateCardResult>> {
    let command = body(payload)?;
    Ok(Json(state.create_card.handle(command).await?))
}

pub async fn request_otp(
    State(state): State<AppState>,
    payload: Result<Json<RequestOtpCommand>, JsonRejection>,
) -> AppResult<Json<RequestOtpResult>> {
    let command = body(payload)?;
    Ok(Json(state.request_otp.handle(command).await?))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpCommand>, JsonRejection>,
) -> AppResult<Json<VerifyOtpResult>> {
    let command = body(payload)?;
    Ok(Json(state.verify_otp.handle(command).await?))
}

pub async fn card_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<CardStatus>> {
    let query = GetCardStatusQuery { card_token: token };
    Ok(Json(state.card_status.handle(query).await?))
}

pub async fn health(State(state): State<AppState>) -> Response {
    let mut status = HealthStatus::new();
    for check in state.health_checks.iter() {
        match check.check().await {
            Ok(()) => status.add_check(check.name(), true, None),
            Err(e) => status.add_check(check.name(), false, Some(e.to_string())),
        }
    }

    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status)).into_response()
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
