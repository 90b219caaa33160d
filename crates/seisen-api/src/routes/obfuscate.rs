//! `POST /api/obfuscate`: run the Lua obfuscator on submitted source.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::obfuscator::{LuaVersion, Preset};
use crate::state::AppState;

/// Largest accepted source, in bytes.
pub const MAX_CODE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ObfuscateRequest {
    pub code: Option<String>,
    /// `lua51` or `luau`, case-insensitive.
    pub version: Option<String>,
    /// `minify`, `weak`, `medium` or `strong`, case-insensitive.
    pub preset: Option<String>,
}

impl ObfuscateRequest {
    fn parsed(&self) -> Result<(&str, LuaVersion, Preset), String> {
        let code = self
            .code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                "Invalid request: code is required and must be a non-empty string".to_string()
            })?;
        if code.len() > MAX_CODE_BYTES {
            return Err("Invalid request: code is too large".to_string());
        }
        let version = self
            .version
            .as_deref()
            .unwrap_or_default()
            .parse::<LuaVersion>()?;
        let preset = self.preset.as_deref().unwrap_or_default().parse::<Preset>()?;
        Ok((code, version, preset))
    }
}

impl Validate for ObfuscateRequest {
    fn validate(&self) -> Result<(), String> {
        self.parsed().map(|_| ())
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscateMetadata {
    pub version: LuaVersion,
    pub preset: Preset,
    pub original_size: usize,
    pub obfuscated_size: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscateResponse {
    pub success: bool,
    pub obfuscated_code: String,
    pub metadata: ObfuscateMetadata,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/obfuscate", post(obfuscate))
}

/// POST /api/obfuscate
#[utoipa::path(
    post,
    path = "/api/obfuscate",
    request_body = ObfuscateRequest,
    responses(
        (status = 200, description = "Obfuscated source", body = ObfuscateResponse),
        (status = 400, description = "Invalid code, version or preset", body = crate::error::ErrorBody),
        (status = 500, description = "Obfuscator missing or failed", body = crate::error::ErrorBody),
    ),
    tag = "obfuscator"
)]
pub async fn obfuscate(
    State(state): State<AppState>,
    body: Result<Json<ObfuscateRequest>, JsonRejection>,
) -> Result<Json<ObfuscateResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let (code, version, preset) = req.parsed().map_err(AppError::BadRequest)?;

    let result = state.obfuscator.obfuscate(code, version, preset).await?;

    Ok(Json(ObfuscateResponse {
        success: true,
        obfuscated_code: result.code,
        metadata: ObfuscateMetadata {
            version,
            preset,
            original_size: result.original_size,
            obfuscated_size: result.obfuscated_size,
        },
    }))
}
