//! ipam-plugin: remote IPAM plugin protocol adapter.
//!
//! Serves the plugin discovery endpoint and the six `IpamDriver.*` routes
//! over HTTP, forwarding each call to a [`Driver`] supplied by the
//! integrator. Allocation itself happens entirely inside the driver.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ipam_plugin::{Driver, IpamHandler, transport::{ServerConfig, serve}};
//!
//! # async fn run(driver: Arc<dyn Driver>) -> anyhow::Result<()> {
//! let handler = Arc::new(IpamHandler::new(driver));
//! serve(ServerConfig::unix("my-ipam", None), handler).await
//! # }
//! ```

pub mod api;
pub mod codec;
pub mod driver;
pub mod handler;
pub mod logging;
pub mod protocol;
pub mod transport;

pub use api::{
    AddressReleaseRequest, AddressRequest, AddressResponse, AddressSpacesResponse,
    CapabilitiesResponse, ErrorResponse, Options, PoolReleaseRequest, PoolRequest, PoolResponse,
};
pub use codec::PluginReply;
pub use driver::{Driver, DriverError, DriverResult};
pub use handler::{ErrorEncoding, IpamHandler};
pub use protocol::{ACTIVATE_PATH, IpamRoute, MANIFEST, PLUGIN_CONTENT_TYPE};
