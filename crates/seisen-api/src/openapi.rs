//! # OpenAPI Document
//!
//! Collects every documented route into one OpenAPI 3.1 document, served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Registers the admin bearer scheme.
struct AdminBearer;

impl Modify for AdminBearer {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Token from POST /api/admin/login, or ADMIN_PASSWORD itself.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Seisen Hub API",
        description = "Shop backend: PayPal checkout, Roblox purchase reconciliation, \
                       the Prometheus Lua obfuscator, the support desk and the admin dashboard.\n\n\
                       Admin routes take `Authorization: Bearer <token>`."
    ),
    servers((url = "http://localhost:3000", description = "Local development server")),
    paths(
        crate::routes::health::api_health,
        crate::routes::paypal::create_order,
        crate::routes::paypal::capture_order,
        crate::routes::roblox::verify_purchase,
        crate::routes::test_keys::generate_key,
        crate::routes::obfuscate::obfuscate,
        crate::routes::support::create_ticket,
        crate::routes::support::get_ticket,
        crate::routes::support::user_reply,
        crate::routes::visitors::visitor_stats,
        crate::routes::admin::login,
        crate::routes::admin::list_payments,
        crate::routes::admin::export_payments,
        crate::routes::admin::list_entitlements,
        crate::routes::admin::list_tickets,
        crate::routes::admin::admin_reply,
        crate::routes::admin::update_status,
        crate::routes::admin::visitors,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::routes::health::HealthResponse,
        crate::routes::health::ReadinessResponse,
        crate::routes::paypal::CreateOrderRequest,
        crate::routes::paypal::CreateOrderResponse,
        crate::routes::paypal::CaptureOrderRequest,
        crate::routes::paypal::CaptureOrderResponse,
        crate::routes::roblox::VerifyPurchaseRequest,
        crate::routes::roblox::VerifyPurchaseResponse,
        crate::routes::roblox::ExpiredResponse,
        crate::routes::test_keys::GenerateKeyRequest,
        crate::routes::test_keys::GenerateKeyResponse,
        crate::routes::obfuscate::ObfuscateRequest,
        crate::routes::obfuscate::ObfuscateMetadata,
        crate::routes::obfuscate::ObfuscateResponse,
        crate::routes::support::CreateTicketRequest,
        crate::routes::support::CreateTicketResponse,
        crate::routes::support::TicketThreadResponse,
        crate::routes::support::ReplyRequest,
        crate::routes::support::MessageResponse,
        crate::routes::visitors::VisitorCountResponse,
        crate::routes::admin::LoginRequest,
        crate::routes::admin::LoginResponse,
        crate::routes::admin::PaymentsResponse,
        crate::routes::admin::EntitlementsResponse,
        crate::routes::admin::TicketsResponse,
        crate::routes::admin::AdminReplyRequest,
        crate::routes::admin::StatusRequest,
        crate::routes::admin::VisitorsResponse,
    )),
    modifiers(&AdminBearer),
    tags(
        (name = "health", description = "Service status"),
        (name = "paypal", description = "PayPal orders and key issuance"),
        (name = "roblox", description = "Roblox purchase reconciliation"),
        (name = "test", description = "Simulated payments, disabled by default"),
        (name = "obfuscator", description = "Prometheus Lua obfuscation"),
        (name = "support", description = "Customer support tickets"),
        (name = "visitors", description = "Landing page visit counter"),
        (name = "admin", description = "Dashboard, requires a bearer token"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_public_and_admin_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/health",
            "/api/roblox/verify-purchase",
            "/api/paypal/capture-order",
            "/api/support/ticket/{number}",
            "/api/admin/payments/export",
            "/api/admin/ticket/{number}/status",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("ErrorBody"));
    }

    #[test]
    fn test_document_serializes() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "Seisen Hub API");
    }
}
