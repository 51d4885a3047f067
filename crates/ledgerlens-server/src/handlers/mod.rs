//! HTTP handlers for the `/api` routes
//!
//! - `search` - POST /api/search
//! - `usage` - GET /api/usage
//! - `health` - GET /api/health (public)

pub mod health;
pub mod search;
pub mod usage;

pub use health::*;
pub use search::*;
pub use usage::*;
