//! API Module
//!
//! HTTP handlers, routing and the WebSocket relay for the sync server.
//!
//! # Endpoints
//! - `GET|PUT|DELETE /cache/:partition/:id` - Document access through the coordinator
//! - `POST /cache/:partition/:id/invalidate` - Drop a cached entry
//! - `GET /sync/pending`, `POST /sync/connectivity`, `POST /sync/now` - Offline queue
//! - `GET /stats` - Cache and queue statistics
//! - `GET /health` - Health check endpoint
//! - `GET /ws` - WebSocket relay

pub mod handlers;
pub mod relay;
pub mod routes;

pub use handlers::*;
pub use relay::RelayHub;
pub use routes::create_router;
