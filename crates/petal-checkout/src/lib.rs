//! # petal-checkout: Cart & Order Services
//!
//! The stateful half of the storefront core. Every service talks to the
//! [`store::Store`] port and runs each public operation in one store
//! transaction.
//!
//! ## Services
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CartManager ──────┬──► StockValidator ──► derived stock (ledger)      │
//! │   get_or_create    │                                                    │
//! │   add / update /   ├──► DiscountEngine ──► redemption ledger          │
//! │   remove / clear   │                                                    │
//! │   merge_on_login   └──► petal_core::pricing::summarize                 │
//! │                                                                         │
//! │  OrderService ─────────► OrderNotifier (after commit, best effort)     │
//! │   create_order / update_status / payments / refunds / reads            │
//! │                                                                         │
//! │  Inventory ────────────► adjust / reconcile the stock ledger           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`store`] - Persistence ports (`Store`, `StoreTx`)
//! - [`memory`] - In-memory `Store` with fault injection
//! - [`cart`] - Cart aggregate manager and cart views
//! - [`order`] - Order creation, status machine, payments and refunds
//! - [`discount`] - Discount engine
//! - [`stock`] - Stock validator
//! - [`inventory`] - Ledger adjustments and reconciliation
//! - [`notify`] - Order confirmation port
//! - [`config`] - `storefront.toml` and environment overrides
//! - [`telemetry`] - `tracing` subscriber setup for binaries
//! - [`error`] - Service errors and error codes

pub mod cart;
pub mod config;
pub mod discount;
pub mod error;
pub mod inventory;
pub mod memory;
pub mod notify;
pub mod order;
pub mod stock;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use cart::{CartLineView, CartManager, CartView};
pub use config::{ConfigError, StorefrontConfig};
pub use discount::DiscountEngine;
pub use error::{CartError, CheckoutError, CheckoutResult, ErrorCode, OrderError, OrderResult, VariantError};
pub use inventory::Inventory;
pub use memory::MemoryStore;
pub use notify::{LoggingNotifier, NotifyError, OrderNotifier};
pub use order::{OrderService, OrderView};
pub use stock::{StockLevel, StockValidator};
pub use store::{Store, StoreError, StoreResult, StoreTx};
