//! Transport layer for the plugin.
//!
//! The daemon speaks HTTP/1.1, either over a UNIX socket in its plugin
//! directory or over TCP announced through a spec file.

pub mod http;

pub use http::{PluginAddr, PluginServer, ServerConfig, Transport, routes, serve};
