//! Create and resolve cart links.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cart::CartApi;
use crate::export::CartExporter;
use crate::import::CartImporter;
use crate::resolver::{self, Lookup, Resolution};
use crate::snapshot::CartSnapshot;
use crate::store::{DEFAULT_LINK_TTL, SnapshotStore};
use crate::token::{Token, TokenGenerator};
use crate::{CartLinkError, Result};

/// Composes token generation, the snapshot store, export and import.
#[derive(Clone)]
pub struct CartLinkService {
    store: Arc<dyn SnapshotStore>,
    tokens: TokenGenerator,
    exporter: CartExporter,
    importer: CartImporter,
    ttl: Duration,
}

impl std::fmt::Debug for CartLinkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartLinkService")
            .field("tokens", &self.tokens)
            .field("exporter", &self.exporter)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CartLinkService {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            tokens: TokenGenerator::default(),
            exporter: CartExporter::default(),
            importer: CartImporter::new(),
            ttl: DEFAULT_LINK_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_token_generator(mut self, tokens: TokenGenerator) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_exporter(mut self, exporter: CartExporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Snapshot `cart` and store it under a fresh token.
    ///
    /// Nothing is stored unless the whole operation succeeds.
    pub async fn create(&self, cart: &dyn CartApi) -> Result<Token> {
        let snapshot = self.snapshot(cart)?;
        self.publish(&snapshot).await
    }

    /// Export `cart` without storing anything.
    ///
    /// Lets callers release their cart lock before the store is touched.
    pub fn snapshot(&self, cart: &dyn CartApi) -> Result<CartSnapshot> {
        self.exporter.export(cart)
    }

    /// Store an exported snapshot under a fresh token.
    pub async fn publish(&self, snapshot: &CartSnapshot) -> Result<Token> {
        if snapshot.is_empty() {
            return Err(CartLinkError::EmptyCart);
        }
        let token = self.tokens.generate();
        self.store.put(&token, snapshot, self.ttl).await?;

        info!(token = %token, lines = snapshot.len(), "Created cart link");
        Ok(token)
    }

    /// Look up a raw token taken from a request.
    pub async fn lookup(&self, raw: Option<&str>) -> Result<Lookup> {
        let token = match Lookup::classify(raw) {
            Ok(token) => token,
            Err(lookup) => return Ok(lookup),
        };

        match self.store.get(&token).await? {
            Some(snapshot) => Ok(Lookup::Found(token, snapshot)),
            None => {
                debug!(token = %token, "Cart link not found");
                Ok(Lookup::NotFound)
            }
        }
    }

    /// Drive a lookup to its terminal state. `cart` is `None` when the host
    /// cart subsystem is unavailable.
    pub fn apply(&self, lookup: Lookup, cart: Option<&mut dyn CartApi>) -> Resolution {
        resolver::apply(&self.importer, lookup, cart)
    }

    /// Lookup and apply in one step.
    pub async fn resolve(&self, raw: Option<&str>, cart: Option<&mut dyn CartApi>) -> Resolution {
        match self.lookup(raw).await {
            Ok(lookup) => self.apply(lookup, cart),
            Err(e) => Resolution::Fail(e),
        }
    }

    /// Remove expired snapshots from the store.
    pub async fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired().await.map_err(CartLinkError::from)
    }
}
