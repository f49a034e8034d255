pub mod cors;
pub mod jwks;
pub mod response;
pub mod token;

use std::sync::Arc;

use crate::events::EventSink;
use crate::keys::KeyMaterialProvider;
use crate::policy::PolicyEngine;
use crate::storage::OAuthStore;

pub use cors::cors_allow;
pub use jwks::jwks_response;
pub use response::EndpointResponse;
pub use token::{TokenEndpoint, TokenRequest};

/// Collaborators shared by the endpoints.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn OAuthStore>,
    pub keys: Arc<dyn KeyMaterialProvider>,
    pub policy: Arc<dyn PolicyEngine>,
    pub events: Arc<dyn EventSink>,
}

impl Backends {
    pub fn new(
        store: Arc<dyn OAuthStore>,
        keys: Arc<dyn KeyMaterialProvider>,
        policy: Arc<dyn PolicyEngine>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            keys,
            policy,
            events,
        }
    }
}
