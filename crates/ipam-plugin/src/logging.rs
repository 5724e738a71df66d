//! Optional tracing setup for plugin binaries.
//!
//! The library only emits `tracing` events. Binaries that have no subscriber
//! of their own can call [`init_tracing`].

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the filter: `RUST_LOG` if set, else `IPAM_PLUGIN_LOG` for this crate.
fn build_filter(rust_log: Option<&str>, plugin_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log {
        return EnvFilter::new(directives);
    }

    let level = match plugin_log {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    };

    EnvFilter::new(format!("ipam_plugin={level}"))
}

/// Install a stderr subscriber honoring `RUST_LOG`, `IPAM_PLUGIN_LOG` and
/// `LOG_FORMAT=json`. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let plugin_log = std::env::var("IPAM_PLUGIN_LOG").ok();
    let filter = build_filter(rust_log.as_deref(), plugin_log.as_deref());

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}
