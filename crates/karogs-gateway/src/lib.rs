//! # Karogs Gateway
//!
//! Small read-only HTTP API next to the bot.
//!
//! ```text
//! GET /health                  → 200 UP / 503 DOWN
//! GET /api/v1/flag-days?year=Y → the year's flag days
//! GET /api/v1/flag-days/next   → the next flag day, or 404
//! *                            → 404 Not Found
//! ```

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
