use crate::api_docs::ApiDoc;
use crate::config::AppState;
use axum::Router;
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_redoc::{Redoc, Servable};

/// Creates a new router with the documentation routes
///
/// This function configures routes for `ReDoc` and `RapiDoc`:
/// - `ReDoc` is served at `/redoc`
/// - `RapiDoc` is served at `/rapidoc`, with the raw document at `/api-docs/openapi.json`
///
/// # Returns
/// A Router with the documentation routes
pub fn get_routes() -> Router<Arc<RwLock<AppState>>> {
    let redoc = Redoc::with_url("/redoc", ApiDoc::openapi());
    let rapidoc = RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc");

    Router::new().merge(redoc).merge(rapidoc)
}
