//! Axum-based HTTP shell for the TRMNL device.
//!
//! Provides:
//! - GET `/` - Service info as JSON
//! - GET `/webhook` - Current fruit as a 1-bit BMP
//!
//! The webhook always answers 200 with a bitmap. Fetch and render failures
//! turn into an error bitmap with a shorter refresh hint.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::fruit_data::DataProvider;
use crate::renderer::DisplayRenderer;

/// Suggested seconds until the device polls again
pub const REFRESH_HEADER: HeaderName = HeaderName::from_static("x-trmnl-refresh");

/// Identifies the plugin to the device
pub const PLUGIN_UUID_HEADER: HeaderName = HeaderName::from_static("x-trmnl-plugin-uuid");

/// Shared handles for the route handlers
pub struct AppState {
    pub provider: DataProvider,
    pub renderer: DisplayRenderer,
    pub config: Config,
}

/// Build the router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/webhook", get(webhook))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - Explains the service
async fn home(State(state): State<Arc<AppState>>) -> Json<Value> {
    let last_update = state.provider.last_update().await.map(|t| t.to_rfc3339());
    Json(json!({
        "name": "TRMNL Fruit",
        "description": "Rotating fruit of the day for TRMNL e-ink displays",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "last_update": last_update,
        "refresh_interval": state.config.refresh_seconds(),
    }))
}

/// GET /webhook - Renders the next fruit in the rotation
async fn webhook(State(state): State<Arc<AppState>>) -> Response {
    let rendered = match state.provider.get_snapshot().await {
        Ok(snapshot) => {
            info!(
                id = snapshot.item.id,
                position = %snapshot.position_label(),
                "rendering snapshot"
            );
            state.renderer.render(&snapshot).map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    };

    match rendered {
        Ok(bytes) => bmp_response(bytes, state.config.refresh_seconds(), &state.config),
        Err(message) => {
            error!(error = %message, "webhook failed, serving error bitmap");
            bmp_response(
                state.renderer.render_error(&message),
                state.config.refresh.error_retry_seconds,
                &state.config,
            )
        }
    }
}

fn bmp_response(bytes: Vec<u8>, refresh_seconds: u64, config: &Config) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/bmp".to_string()),
            (REFRESH_HEADER, refresh_seconds.to_string()),
            (PLUGIN_UUID_HEADER, config.plugin_uuid().to_string()),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::bmp_len;
    use crate::fonts::FontSet;
    use crate::fruit_data::{FetchError, ItemSource, RandomShuffle};
    use crate::Item;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    struct StaticSource(Vec<Item>);

    #[async_trait]
    impl ItemSource for StaticSource {
        async fn fetch_items(&self) -> Result<Vec<Item>, FetchError> {
            Ok(self.0.clone())
        }
    }

    fn create_test_app(items: Vec<Item>) -> Router {
        let config = Config::default();
        let provider = DataProvider::with_shuffle(
            Box::new(StaticSource(items)),
            Duration::from_secs(config.cache.ttl_seconds),
            Box::new(RandomShuffle::seeded(1)),
        );
        let renderer = DisplayRenderer::new(
            config.display.width,
            config.display.height,
            config.layout,
            FontSet::builtin(),
        );
        build_router(Arc::new(AppState {
            provider,
            renderer,
            config,
        }))
    }

    fn apple() -> Item {
        serde_json::from_value(json!({
            "id": 6, "name": "Apple", "family": "Rosaceae", "order": "Rosales",
            "genus": "Malus",
            "nutritions": {"calories": 52, "fat": 0.4, "sugar": 10.3,
                           "carbohydrates": 11.4, "protein": 0.3}
        }))
        .unwrap()
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_webhook_serves_bitmap() {
        let response = get(create_test_app(vec![apple()]), "/webhook").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/bmp");
        assert_eq!(response.headers()[&REFRESH_HEADER], "3600");
        assert_eq!(response.headers()[&PLUGIN_UUID_HEADER], "dev-uuid");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.len(), bmp_len(800, 480));
    }

    #[tokio::test]
    async fn test_webhook_empty_source_serves_error_bitmap() {
        let response = get(create_test_app(vec![]), "/webhook").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/bmp");
        assert_eq!(response.headers()[&REFRESH_HEADER], "300");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.len(), bmp_len(800, 480));
    }

    #[tokio::test]
    async fn test_webhook_render_failure_serves_error_bitmap() {
        let mut broken = apple();
        broken.fields.remove("nutritions");
        let response = get(create_test_app(vec![broken]), "/webhook").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&REFRESH_HEADER], "300");
    }

    #[tokio::test]
    async fn test_home_reports_status() {
        let response = get(create_test_app(vec![apple()]), "/").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["refresh_interval"], 3600);
        assert!(json["last_update"].is_null());
    }
}
