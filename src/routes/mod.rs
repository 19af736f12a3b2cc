pub mod api_routes;
pub mod docs_routes;
pub mod middleware;
