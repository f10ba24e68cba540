//! MITM proxy server.
//!
//! Wires the CA, the [`CaptureHandler`] and the capture pipeline into a
//! hudsucker proxy.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use hudsucker::rustls::crypto::aws_lc_rs::default_provider;
use hudsucker::Proxy;
use tokio::sync::broadcast;

use lens_core::{CaptureConfig, CapturePipeline};

use crate::ca::CaManager;
use crate::error::{ProxyError, Result};
use crate::handler::CaptureHandler;
use crate::DEFAULT_PROXY_PORT;

/// Proxy server configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to bind the proxy to.
    pub addr: SocketAddr,
    /// The CA manager for certificate generation.
    pub ca_manager: CaManager,
    /// Capture settings. The host resolves these once at startup.
    pub capture: CaptureConfig,
}

impl ProxyConfig {
    /// Creates a configuration around an explicit CA manager, listening on
    /// `127.0.0.1:8888` with default capture settings.
    pub fn with_ca_manager(ca_manager: CaManager) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PROXY_PORT)),
            ca_manager,
            capture: CaptureConfig::default(),
        }
    }

    /// Sets the listen address.
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Sets the port (uses 127.0.0.1 as host).
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr = SocketAddr::from(([127, 0, 0, 1], port));
        self
    }

    /// Sets the capture configuration.
    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }
}

/// MITM proxy server feeding the capture pipeline.
pub struct ProxyServer {
    config: ProxyConfig,
    pipeline: Arc<CapturePipeline>,
}

impl ProxyServer {
    /// Creates a proxy server, generating the CA if it does not exist yet.
    pub fn new(config: ProxyConfig) -> Result<Self> {
        config.ca_manager.ensure_ca()?;
        let pipeline = CapturePipeline::new(config.capture.clone())?;

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
        })
    }

    /// Returns the address the proxy is configured to listen on.
    pub fn addr(&self) -> SocketAddr {
        self.config.addr
    }

    /// Returns the CA certificate path clients must trust.
    pub fn ca_cert_path(&self) -> PathBuf {
        self.config.ca_manager.cert_path()
    }

    /// Returns the capture configuration in effect.
    pub fn capture_config(&self) -> &CaptureConfig {
        self.pipeline.config()
    }

    /// Starts the proxy in the background.
    ///
    /// Returns a handle that can be used to stop the server.
    pub fn start(self) -> Result<ProxyHandle> {
        let authority = self.config.ca_manager.ensure_ca()?;
        let handler = CaptureHandler::new(Arc::clone(&self.pipeline));
        let addr = self.addr();

        let proxy = Proxy::builder()
            .with_addr(addr)
            .with_ca(authority)
            .with_rustls_connector(default_provider())
            .with_http_handler(handler)
            .build()
            .map_err(|e| ProxyError::Proxy(e.to_string()))?;

        tracing::info!("Starting capture proxy on {}", addr);
        tracing::info!("CA certificate: {:?}", self.ca_cert_path());
        tracing::info!("Forwarding captures to {}", self.capture_config().ingest_url);

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

        let handle = tokio::spawn(async move {
            tokio::select! {
                result = proxy.start() => {
                    result.map_err(|e| ProxyError::Proxy(e.to_string()))
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Proxy shutdown signal received");
                    Ok(())
                }
            }
        });

        Ok(ProxyHandle { shutdown_tx, handle })
    }
}

/// Handle for controlling a running proxy server.
pub struct ProxyHandle {
    shutdown_tx: broadcast::Sender<()>,
    handle: tokio::task::JoinHandle<Result<()>>,
}

impl ProxyHandle {
    /// Waits until the proxy stops on its own and returns its result.
    ///
    /// Cancel-safe: dropping the future leaves the proxy running.
    pub async fn finished(&mut self) -> Result<()> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) => Err(ProxyError::Proxy(format!("proxy task failed: {e}"))),
        }
    }

    /// Shuts down the proxy and waits for it to finish.
    pub async fn stop(mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.finished().await
    }
}
