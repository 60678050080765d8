//! HTTP 接口（axum）

mod handlers;
mod router;

pub use router::*;
