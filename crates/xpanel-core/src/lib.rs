//! Subscription core for xpanel: token lifecycle, node aggregation and client config rendering.
//!
//! Everything here is storage-agnostic; persistence and the node inventory are
//! reached through the [`TokenStore`] and [`NodeInventory`] traits.

pub mod codec;
pub mod error;
pub mod lifecycle;
pub mod links;
pub mod models;
pub mod nodes;
pub mod render;
pub mod store;

pub use error::{InventoryError, RenderError, StoreError, TokenError};
pub use lifecycle::TokenManager;
pub use links::{ClientFormat, SubscriptionLinks};
pub use nodes::{AggregatedNode, NodeInventory};
pub use store::{NewToken, TokenRecord, TokenStore};
