//! Shareable cart snapshots.
//!
//! A shopper's cart is exported into a [`CartSnapshot`], stored under a short
//! random [`Token`] for a fixed window, and later replayed into another cart
//! when the link carrying that token is opened.
//!
//! The crate has no opinion about HTTP or sessions. The host cart is reached
//! through the [`CartApi`] trait and snapshots live behind the
//! [`SnapshotStore`] trait, so both can be swapped out or faked in tests.

pub mod cart;
pub mod clock;
pub mod export;
pub mod import;
pub mod resolver;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod token;

pub use cart::{AddLine, CartApi, CartLine, LineData, LineRejection, ObjectRef};
pub use clock::{Clock, ManualClock, SystemClock};
pub use export::{CartExporter, DEFAULT_DENIED_KEYS};
pub use import::{CartImporter, ImportReport, LineFailure};
pub use resolver::{Lookup, Resolution};
pub use service::CartLinkService;
pub use snapshot::{CartSnapshot, LineItem, StoreEntry};
pub use store::{
    DEFAULT_LINK_TTL, FileSnapshotStore, MemorySnapshotStore, SnapshotStore, StoreError,
};
pub use token::{DEFAULT_TOKEN_LENGTH, MIN_TOKEN_LENGTH, Token, TokenGenerator};

use thiserror::Error;

/// Errors surfaced by the create and consume paths.
///
/// The display strings are shown to shoppers as-is.
#[derive(Error, Debug)]
pub enum CartLinkError {
    /// Missing or stale CSRF nonce on the create path.
    #[error("Invalid request.")]
    InvalidRequest,
    /// Nothing to snapshot.
    #[error("Cart is empty.")]
    EmptyCart,
    /// The host cart subsystem is not available.
    #[error("WooCommerce required.")]
    DependencyMissing,
    /// Expired, unknown or malformed token.
    #[error("Cart link expired or invalid.")]
    TokenNotFound,
    #[error("Snapshot store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CartLinkError>;
