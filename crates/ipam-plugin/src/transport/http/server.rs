//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

use crate::handler::IpamHandler;

use super::routes::routes;

/// Where the daemon looks for plugin sockets.
pub const DEFAULT_SOCKET_DIR: &str = "/run/docker/plugins";

/// Where the daemon looks for TCP plugin spec files.
pub const DEFAULT_SPEC_DIR: &str = "/etc/docker/plugins";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// `<socket_dir>/<name>.sock`, mode 0660, optionally owned by `gid`.
    Unix { gid: Option<u32> },
    /// Listen on `addr`; a bare `:port` binds all interfaces.
    Tcp { addr: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Plugin name as the daemon knows it.
    pub name: String,
    pub transport: Transport,
    pub socket_dir: PathBuf,
    /// `None` skips writing a spec file for TCP.
    pub spec_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "ipam".to_string(),
            transport: Transport::Unix { gid: None },
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            spec_dir: Some(PathBuf::from(DEFAULT_SPEC_DIR)),
        }
    }
}

impl ServerConfig {
    pub fn unix(name: impl Into<String>, gid: Option<u32>) -> Self {
        Self {
            name: name.into(),
            transport: Transport::Unix { gid },
            ..Default::default()
        }
    }

    pub fn tcp(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: Transport::Tcp { addr: addr.into() },
            ..Default::default()
        }
    }

    pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = dir.into();
        self
    }

    pub fn with_spec_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.spec_dir = dir;
        self
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_dir.join(format!("{}.sock", self.name))
    }

    pub fn spec_path(&self) -> Option<PathBuf> {
        self.spec_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.spec", self.name)))
    }
}

/// Address the server actually bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl std::fmt::Display for PluginAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginAddr::Tcp(addr) => write!(f, "tcp://{addr}"),
            PluginAddr::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// Files created for discovery; removed when the server goes away.
struct Artifacts(Vec<PathBuf>);

impl Drop for Artifacts {
    fn drop(&mut self) {
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed plugin file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove plugin file"),
            }
        }
    }
}

/// A bound plugin endpoint, not yet serving.
pub struct PluginServer {
    listener: Listener,
    local_addr: PluginAddr,
    artifacts: Artifacts,
}

impl PluginServer {
    /// Bind the configured transport and write its discovery file.
    pub async fn bind(config: &ServerConfig) -> anyhow::Result<Self> {
        match &config.transport {
            Transport::Tcp { addr } => {
                let addr = normalize_tcp_addr(addr);
                let listener = TcpListener::bind(addr.as_str())
                    .await
                    .with_context(|| format!("failed to bind {addr}"))?;
                let local = listener.local_addr()?;

                let mut artifacts = Artifacts(Vec::new());
                if let Some(spec_path) = config.spec_path() {
                    write_spec(&spec_path, &format!("tcp://{local}"))?;
                    artifacts.0.push(spec_path);
                }

                Ok(Self {
                    listener: Listener::Tcp(listener),
                    local_addr: PluginAddr::Tcp(local),
                    artifacts,
                })
            }
            #[cfg(unix)]
            Transport::Unix { gid } => {
                let path = config.socket_path();
                let listener = bind_unix(&path, *gid)?;

                Ok(Self {
                    listener: Listener::Unix(listener),
                    local_addr: PluginAddr::Unix(path.clone()),
                    artifacts: Artifacts(vec![path]),
                })
            }
            #[cfg(not(unix))]
            Transport::Unix { .. } => {
                anyhow::bail!("unix socket transport is not supported on this platform")
            }
        }
    }

    pub fn local_addr(&self) -> &PluginAddr {
        &self.local_addr
    }

    /// Serve until `shutdown` resolves, then remove socket and spec files.
    pub async fn run<F>(self, handler: Arc<IpamHandler>, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            local_addr,
            artifacts,
        } = self;
        let app = routes(handler);

        info!("Starting IPAM plugin server on {}", local_addr);

        match listener {
            Listener::Tcp(listener) => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await?
            }
            #[cfg(unix)]
            Listener::Unix(listener) => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await?
            }
        }

        drop(artifacts);
        info!("Server shutdown complete");

        Ok(())
    }
}

/// Bind per `config` and serve until SIGINT or SIGTERM.
pub async fn serve(config: ServerConfig, handler: Arc<IpamHandler>) -> anyhow::Result<()> {
    let server = PluginServer::bind(&config).await?;
    server.run(handler, shutdown_signal()).await
}

fn normalize_tcp_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

fn write_spec(path: &Path, url: &str) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create spec directory {}", dir.display()))?;
    }
    std::fs::write(path, url)
        .with_context(|| format!("failed to write spec file {}", path.display()))?;
    debug!(path = %path.display(), url, "Wrote plugin spec file");
    Ok(())
}

#[cfg(unix)]
fn bind_unix(path: &Path, gid: Option<u32>) -> anyhow::Result<UnixListener> {
    use std::fs::{DirBuilder, Permissions};
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    if let Some(dir) = path.parent() {
        DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(dir)
            .with_context(|| format!("failed to create socket directory {}", dir.display()))?;
    }

    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to remove stale socket {}", path.display()));
        }
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("failed to bind {}", path.display()))?;

    if let Some(gid) = gid {
        nix::unistd::chown(path, None, Some(nix::unistd::Gid::from_raw(gid)))
            .with_context(|| format!("failed to set group {gid} on {}", path.display()))?;
    }
    std::fs::set_permissions(path, Permissions::from_mode(0o660))
        .with_context(|| format!("failed to set permissions on {}", path.display()))?;

    Ok(listener)
}

/// Wait for SIGINT or SIGTERM.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed, which only happens when the
/// tokio runtime is misconfigured. That is an unrecoverable startup error.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler - is tokio runtime configured correctly?");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler - is tokio runtime configured correctly?")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
