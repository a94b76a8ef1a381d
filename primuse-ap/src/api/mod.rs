//! Local control API
//!
//! Any number of UI clients drive the single coordinator over HTTP and follow
//! session changes over SSE.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
