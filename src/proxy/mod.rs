//! HTTP proxy server

mod error;
mod handler;
mod params;
pub mod server;

pub use error::{ApiError, DANMAKU_FAILED, VIDEO_INFO_FAILED};
pub use params::{query_value, Bvid, Cid, Required, RequiredParam};
pub use server::{build_router, run_server, ProxyState};
