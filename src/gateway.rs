//! Composition root.
//!
//! Wires storage, session, resolver, request client and tenant directory
//! from a validated `GatewayConfig`. Every component is a cheap handle;
//! clones share state.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::Session;
use crate::config::GatewayConfig;
use crate::directory::TenantDirectory;
use crate::discovery::EndpointResolver;
use crate::http::{HttpTransport, ReqwestTransport, RequestClient, TransportError};
use crate::schedule::{Clock, SystemClock};
use crate::storage::{FileStore, KeyValueStore, MemoryStore, StoreError};

/// Failure while assembling the gateway.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to open state store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

/// All client-side components sharing one backend connection.
#[derive(Clone)]
pub struct Gateway {
    pub store: Arc<dyn KeyValueStore>,
    pub session: Session,
    pub resolver: EndpointResolver,
    pub client: RequestClient,
    pub directory: TenantDirectory,
}

impl Gateway {
    /// Build with the production transport, the system clock and the
    /// configured store (in-memory when no path is set).
    pub fn from_config(config: &GatewayConfig) -> Result<Self, BuildError> {
        let store: Arc<dyn KeyValueStore> = match &config.storage.path {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let transport = ReqwestTransport::new(
            &config.request.user_agent,
            Duration::from_millis(config.resolver.probe_timeout_ms),
        )?;
        Ok(Self::with_parts(config, store, Arc::new(transport), Arc::new(SystemClock)))
    }

    /// Build from explicit parts.
    pub fn with_parts(
        config: &GatewayConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session = Session::restore(store.clone());
        let resolver = EndpointResolver::new(&config.resolver, transport.clone(), store.clone(), clock.clone());
        let client = RequestClient::new(&config.request, resolver.clone(), transport, session.clone());
        let directory = TenantDirectory::new(&config.directory, client.clone(), store.clone(), clock);
        Self {
            store,
            session,
            resolver,
            client,
            directory,
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("session", &self.session)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}
