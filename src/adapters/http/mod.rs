//! HTTP adapter: the REST surface over axum.

mod dto;
mod handlers;
mod routes;

pub use dto::ErrorResponse;
pub use handlers::AppState;
pub use routes::api_routes;
