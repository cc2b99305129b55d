//! API Module
//!
//! Admin HTTP surface over a [`Cache`](crate::cache::Cache).
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value with optional TTL and tags
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `POST /invalidate` - Delete every key carrying the given tags
//! - `GET /keys` - List live keys
//! - `DELETE /clear` - Remove everything
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
