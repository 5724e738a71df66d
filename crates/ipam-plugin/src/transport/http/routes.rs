//! HTTP route table.

use std::sync::Arc;

use axum::{Router, body::Bytes, extract::State, routing::any};

use crate::codec::PluginReply;
use crate::handler::IpamHandler;
use crate::protocol::{ACTIVATE_PATH, IpamRoute};

async fn activate(State(handler): State<Arc<IpamHandler>>) -> PluginReply {
    tracing::debug!("Plugin activation requested");
    handler.activate()
}

// The daemon sends a vendor content type, so the body is taken as raw bytes
// rather than through the Json extractor.
async fn dispatch(handler: Arc<IpamHandler>, route: IpamRoute, body: Bytes) -> PluginReply {
    handler.handle(route, &body).await
}

/// Build the router: the discovery endpoint plus the six IPAM routes.
///
/// Routes match on path only, any method is accepted.
pub fn routes(handler: Arc<IpamHandler>) -> Router {
    let mut router = Router::new().route(ACTIVATE_PATH, any(activate));

    for route in IpamRoute::ALL {
        router = router.route(
            route.path(),
            any(
                move |State(handler): State<Arc<IpamHandler>>, body: Bytes| {
                    dispatch(handler, route, body)
                },
            ),
        );
    }

    router.with_state(handler)
}
