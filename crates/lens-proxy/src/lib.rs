//! Lens Proxy - MITM proxy feeding the capture pipeline.
//!
//! Coding agents that talk to their vendor APIs directly over HTTPS cannot be
//! pointed at a custom base URL. This crate runs a local intercepting proxy
//! for them and hands every completed LLM API call to
//! [`lens_core::CapturePipeline`].
//!
//! ## Flow
//!
//! ```text
//! Client Request → Proxy → POST + pattern match?
//!                               │
//!              ┌────────────────┴────────────────┐
//!              │ No                              │ Yes
//!              ▼                                 ▼
//!         Passthrough                 Buffer body, forward as-is
//!                                                │
//!                                                ▼
//!                                  Upstream response, forward as-is
//!                                                │
//!                                                ▼
//!                                 Spawn capture pipeline (detached)
//! ```
//!
//! Traffic is never altered: buffered bodies are re-emitted byte-for-byte and
//! capture failures stay inside the spawned task.

mod ca;
mod error;
mod handler;
mod proxy;

#[cfg(test)]
mod test_support;

pub use ca::{CaManager, CaManagerError};
pub use error::{ProxyError, Result};
pub use handler::CaptureHandler;
pub use proxy::{ProxyConfig, ProxyHandle, ProxyServer};

/// Default proxy port.
pub const DEFAULT_PROXY_PORT: u16 = 8888;
