//! Request and Response models for the sync server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{ConnectivityRequest, PendingQuery, WriteKind, WriteRequest};
pub use responses::{
    DocumentResponse, HealthResponse, InvalidateResponse, PendingResponse, StatsResponse,
    SyncResponse, WriteResponse,
};
