//! # Cart Aggregate Manager
//!
//! Owns the cart lifecycle: lookup or creation by session/user identity,
//! line mutations with stock checks, discounts, merge on login and the
//! summarised read view.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   (no row) ──get_or_create / merge_on_login──► ACTIVE                   │
//! │                                                  │                      │
//! │                  add_item / update / remove ◄────┤                      │
//! │                  apply / remove discount   ◄─────┤                      │
//! │                                                  │                      │
//! │          ┌───────────────────┬───────────────────┼──────────────┐      │
//! │          ▼                   ▼                   ▼              │      │
//! │   merged away          CONVERTED            ABANDONED           │      │
//! │   (row deleted)        (order created)      (abandon_stale)     │      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactions
//! Every public operation runs in one store transaction: the stock check,
//! the line write, the discount refresh and the cart touch commit together
//! or not at all. The returned view is built inside the same transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use petal_core::pricing::summarize_items;
use petal_core::stock::StockStatus;
use petal_core::validation::{validate_cart_size, validate_id, validate_quantity};
use petal_core::{Cart, CartItem, CartStatus, CompositeItem, Money, ValidationError};

use crate::config::{CartSettings, StorefrontConfig};
use crate::discount::DiscountEngine;
use crate::error::{CartError, CheckoutError, CheckoutResult};
use crate::stock::{ledger_available, StockValidator};
use crate::store::{Store, StoreTx};

// =============================================================================
// Views
// =============================================================================

/// One cart line joined with its variant and product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLineView {
    pub item_id: String,
    pub variant_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_slug: String,
    pub variant_name: String,
    pub sku: String,
    /// First product image only.
    pub image: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub quantity: i64,
    /// Price frozen when the line was added.
    pub unit_price: Money,
    pub line_total: Money,
    pub composites: Vec<CompositeItem>,
    pub available: i64,
    pub stock_status: StockStatus,
}

/// The summarised cart returned by every cart operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub cart_id: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub status: CartStatus,
    pub items: Vec<CartLineView>,
    pub discount_code: Option<String>,
    pub discount: Money,
    /// Taken off shipping at checkout; not part of `total`.
    pub shipping_discount: Money,
    pub subtotal: Money,
    pub total: Money,
    pub item_count: i64,
}

// =============================================================================
// Cart Manager
// =============================================================================

#[derive(Clone)]
pub struct CartManager {
    store: Arc<dyn Store>,
    stock: StockValidator,
    discounts: DiscountEngine,
    settings: CartSettings,
}

impl CartManager {
    pub fn new(store: Arc<dyn Store>, config: &StorefrontConfig) -> Self {
        CartManager {
            store,
            stock: StockValidator::new(config.stock.low_stock_threshold),
            discounts: DiscountEngine::new(config.money_format()),
            settings: config.cart.clone(),
        }
    }

    async fn begin(&self, operation: &'static str) -> CheckoutResult<Box<dyn StoreTx>> {
        self.store
            .begin()
            .await
            .map_err(CheckoutError::storage(operation))
    }

    async fn commit(tx: Box<dyn StoreTx>, operation: &'static str) -> CheckoutResult<()> {
        tx.commit().await.map_err(CheckoutError::storage(operation))
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Finds the shopper's active cart or creates one.
    ///
    /// ## Search Priority
    /// 1. a cart keyed to both `user_id` and `session_id`
    /// 2. the user's cart
    /// 3. the session's cart
    ///
    /// Duplicates for the same key are collapsed first. When the user's
    /// cart and a separate session cart both exist they are merged.
    pub async fn get_or_create(
        &self,
        session_id: &str,
        user_id: Option<&str>,
    ) -> CheckoutResult<CartView> {
        validate_id("session id", session_id)?;
        if let Some(user_id) = user_id {
            validate_id("user id", user_id)?;
        }
        debug!(session_id = %session_id, user_id = ?user_id, "Resolving cart");

        let mut tx = self.begin("get_or_create").await?;
        let cart = self.resolve_identity(&mut *tx, session_id, user_id).await?;
        let view = self.build_view(&mut *tx, &cart).await?;
        Self::commit(tx, "get_or_create").await?;

        Ok(view)
    }

    /// Reconciles the anonymous session's cart with the user's cart.
    ///
    /// | session cart | user cart | result                                  |
    /// |--------------|-----------|-----------------------------------------|
    /// | -            | -         | new cart keyed to both                  |
    /// | yes          | -         | user id attached to the session cart    |
    /// | -            | yes       | session id attached to the user cart    |
    /// | yes          | yes       | lines merged into the user cart         |
    ///
    /// Running it again with the same identities returns the same cart.
    pub async fn merge_on_login(&self, session_id: &str, user_id: &str) -> CheckoutResult<CartView> {
        validate_id("session id", session_id)?;
        validate_id("user id", user_id)?;
        debug!(session_id = %session_id, user_id = %user_id, "Merging carts on login");

        let mut tx = self.begin("merge_on_login").await?;
        let cart = self
            .resolve_identity(&mut *tx, session_id, Some(user_id))
            .await?;
        let view = self.build_view(&mut *tx, &cart).await?;
        Self::commit(tx, "merge_on_login").await?;

        Ok(view)
    }

    async fn resolve_identity(
        &self,
        tx: &mut dyn StoreTx,
        session_id: &str,
        user_id: Option<&str>,
    ) -> CheckoutResult<Cart> {
        let now = Utc::now();

        let mut session_carts = Vec::new();
        for mut cart in tx
            .find_active_carts_by_session(session_id)
            .await
            .map_err(CheckoutError::storage("find_cart"))?
        {
            match (user_id, cart.user_id.as_deref()) {
                // the user's own cart is picked up by the user lookup below
                (Some(user), Some(owner)) if owner == user => {}
                // another user's cart keeps its lines but gives up the session
                (Some(_), Some(_)) => {
                    cart.session_id = None;
                    cart.touch(now);
                    tx.update_cart(&cart)
                        .await
                        .map_err(CheckoutError::storage("release_session"))?;
                    debug!(cart_id = %cart.id, "Session released from another user's cart");
                }
                _ => session_carts.push(cart),
            }
        }
        let session_cart = self.dedupe(tx, session_carts).await?;

        let user_cart = match user_id {
            Some(user_id) => {
                let carts = tx
                    .find_active_carts_by_user(user_id)
                    .await
                    .map_err(CheckoutError::storage("find_cart"))?;
                self.dedupe(tx, carts).await?
            }
            None => None,
        };

        let mut cart = match (user_cart, session_cart) {
            (Some(mut user_cart), Some(session_cart)) if user_cart.id != session_cart.id => {
                self.merge_into(tx, &mut user_cart, session_cart, now).await?;
                user_cart
            }
            (Some(cart), _) | (None, Some(cart)) => cart,
            (None, None) => {
                let cart = Cart::new(
                    Some(session_id.to_string()),
                    user_id.map(str::to_string),
                    now,
                );
                tx.insert_cart(&cart)
                    .await
                    .map_err(CheckoutError::storage("create_cart"))?;
                info!(cart_id = %cart.id, session_id = %session_id, "Cart created");
                return Ok(cart);
            }
        };

        let session_changed = cart.session_id.as_deref() != Some(session_id);
        let user_changed = user_id.is_some() && cart.user_id.as_deref() != user_id;
        if session_changed || user_changed {
            cart.session_id = Some(session_id.to_string());
            if let Some(user_id) = user_id {
                cart.user_id = Some(user_id.to_string());
            }
            cart.touch(now);
            tx.update_cart(&cart)
                .await
                .map_err(CheckoutError::storage("attach_identity"))?;
            debug!(cart_id = %cart.id, "Cart identity updated");
        }

        Ok(cart)
    }

    /// Keeps the cart with the most lines (ties: earliest created) and
    /// deletes the rest. Safe to repeat.
    async fn dedupe(&self, tx: &mut dyn StoreTx, carts: Vec<Cart>) -> CheckoutResult<Option<Cart>> {
        if carts.len() < 2 {
            return Ok(carts.into_iter().next());
        }

        let mut ranked = Vec::with_capacity(carts.len());
        for cart in carts {
            let lines = tx
                .list_cart_items(&cart.id)
                .await
                .map_err(CheckoutError::storage("dedupe_carts"))?
                .len();
            ranked.push((lines, cart));
        }
        ranked.sort_by(|(a_lines, a), (b_lines, b)| {
            b_lines
                .cmp(a_lines)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        let mut ranked = ranked.into_iter().map(|(_, cart)| cart);
        let keep = ranked.next();
        for duplicate in ranked {
            tx.delete_cart(&duplicate.id)
                .await
                .map_err(CheckoutError::storage("dedupe_carts"))?;
            warn!(cart_id = %duplicate.id, "Deleted duplicate active cart");
        }
        Ok(keep)
    }

    /// Moves every line of `source` into `target` and deletes `source`.
    ///
    /// Same variant: quantities are summed (bounded by the per-line
    /// maximum). Stock is not re-checked here; order creation is the gate.
    async fn merge_into(
        &self,
        tx: &mut dyn StoreTx,
        target: &mut Cart,
        source: Cart,
        now: DateTime<Utc>,
    ) -> CheckoutResult<()> {
        let target_items = tx
            .list_cart_items(&target.id)
            .await
            .map_err(CheckoutError::storage("merge_carts"))?;
        let source_items = tx
            .list_cart_items(&source.id)
            .await
            .map_err(CheckoutError::storage("merge_carts"))?;

        for mut line in source_items {
            match target_items.iter().find(|t| t.variant_id == line.variant_id) {
                Some(existing) => {
                    let mut merged = existing.clone();
                    merged.quantity = (merged.quantity + line.quantity)
                        .min(self.settings.max_item_quantity);
                    merged.updated_at = now;
                    tx.update_cart_item(&merged)
                        .await
                        .map_err(CheckoutError::storage("merge_carts"))?;
                    tx.delete_cart_item(&line.id)
                        .await
                        .map_err(CheckoutError::storage("merge_carts"))?;
                }
                None => {
                    line.cart_id = target.id.clone();
                    line.updated_at = now;
                    tx.update_cart_item(&line)
                        .await
                        .map_err(CheckoutError::storage("merge_carts"))?;
                }
            }
        }

        tx.transfer_redemptions(&source.id, &target.id)
            .await
            .map_err(CheckoutError::storage("merge_carts"))?;

        if target.discount_code.is_none() {
            target.discount_code = source.discount_code.clone();
        }

        tx.delete_cart(&source.id)
            .await
            .map_err(CheckoutError::storage("merge_carts"))?;

        // re-apply against the merged subtotal rather than copying amounts
        if let Some(code) = target.discount_code.clone() {
            let subtotal = self.subtotal(tx, &target.id).await?;
            let reapplied = match self.discounts.resolve(tx, &code).await {
                Ok(discount) => {
                    self.discounts
                        .apply(tx, target, &discount, subtotal, now)
                        .await
                }
                Err(err) => Err(err),
            };
            match reapplied {
                Ok(_) => {}
                Err(CheckoutError::Discount(reason)) => {
                    warn!(cart_id = %target.id, code = %code, %reason, "Discount dropped during merge");
                    target.clear_discount();
                }
                Err(err) => return Err(err),
            }
        }

        target.touch(now);
        tx.update_cart(target)
            .await
            .map_err(CheckoutError::storage("merge_carts"))?;

        info!(target = %target.id, source = %source.id, "Carts merged");
        Ok(())
    }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Adds `quantity` of a variant. An existing line for the variant grows
    /// instead of a second line being inserted.
    ///
    /// ## Errors
    /// - `ValidationError` for blank ids or a quantity outside 1..=max
    /// - `CartError::NotFound` for an unknown or inactive cart
    /// - `VariantError::NotFound` for an unknown variant
    /// - `StockError` when the cumulative quantity exceeds stock
    pub async fn add_item(
        &self,
        cart_id: &str,
        variant_id: &str,
        quantity: i64,
        composites: Vec<CompositeItem>,
    ) -> CheckoutResult<CartView> {
        validate_id("cart id", cart_id)?;
        validate_id("variant id", variant_id)?;
        validate_quantity(quantity, self.settings.max_item_quantity)?;
        debug!(cart_id = %cart_id, variant_id = %variant_id, quantity = quantity, "Adding item");

        let now = Utc::now();
        let mut tx = self.begin("add_item").await?;
        let mut cart = self.load_active_cart(&mut *tx, cart_id).await?;

        let items = tx
            .list_cart_items(cart_id)
            .await
            .map_err(CheckoutError::storage("add_item"))?;

        match items.iter().find(|i| i.variant_id == variant_id) {
            Some(existing) => {
                let mut line = existing.clone();
                validate_quantity(line.quantity + quantity, self.settings.max_item_quantity)?;
                self.stock
                    .check_availability(&mut *tx, variant_id, quantity, line.quantity)
                    .await?;

                line.quantity += quantity;
                if !composites.is_empty() {
                    line.composites = composites;
                }
                line.updated_at = now;
                tx.update_cart_item(&line)
                    .await
                    .map_err(CheckoutError::storage("add_item"))?;
            }
            None => {
                validate_cart_size(items.len(), self.settings.max_lines)?;
                let level = self
                    .stock
                    .check_availability(&mut *tx, variant_id, quantity, 0)
                    .await?;

                let line = CartItem {
                    id: petal_core::new_id(),
                    cart_id: cart.id.clone(),
                    variant_id: variant_id.to_string(),
                    product_id: level.variant.product_id.clone(),
                    quantity,
                    price_cents: level.variant.price_for(None).cents(),
                    composites,
                    created_at: now,
                    updated_at: now,
                };
                tx.insert_cart_item(&line)
                    .await
                    .map_err(CheckoutError::storage("add_item"))?;
            }
        }

        let view = self.finish_mutation(tx, &mut cart, now, "add_item").await?;
        Ok(view)
    }

    /// Sets a line to an absolute quantity. Removal goes through
    /// [`CartManager::remove_item`]; a quantity below 1 is rejected.
    pub async fn update_item_quantity(&self, item_id: &str, quantity: i64) -> CheckoutResult<CartView> {
        validate_id("cart item id", item_id)?;
        validate_quantity(quantity, self.settings.max_item_quantity)?;
        debug!(item_id = %item_id, quantity = quantity, "Updating item quantity");

        let now = Utc::now();
        let mut tx = self.begin("update_item_quantity").await?;
        let mut line = self.load_item(&mut *tx, item_id).await?;
        let mut cart = self.load_active_cart(&mut *tx, &line.cart_id).await?;

        self.stock
            .check_availability(&mut *tx, &line.variant_id, quantity, 0)
            .await?;

        line.quantity = quantity;
        line.updated_at = now;
        tx.update_cart_item(&line)
            .await
            .map_err(CheckoutError::storage("update_item_quantity"))?;

        self.finish_mutation(tx, &mut cart, now, "update_item_quantity")
            .await
    }

    /// Quantity stepper entry point: zero or below removes the line,
    /// anything else behaves as [`CartManager::update_item_quantity`].
    pub async fn set_item_quantity(&self, item_id: &str, quantity: i64) -> CheckoutResult<CartView> {
        if quantity <= 0 {
            return self.remove_item(item_id).await;
        }
        self.update_item_quantity(item_id, quantity).await
    }

    /// Deletes a line. A second call for the same id fails with
    /// `CartError::ItemNotFound`.
    pub async fn remove_item(&self, item_id: &str) -> CheckoutResult<CartView> {
        validate_id("cart item id", item_id)?;
        debug!(item_id = %item_id, "Removing item");

        let now = Utc::now();
        let mut tx = self.begin("remove_item").await?;
        let line = self.load_item(&mut *tx, item_id).await?;
        let mut cart = self.load_active_cart(&mut *tx, &line.cart_id).await?;

        let removed = tx
            .delete_cart_item(item_id)
            .await
            .map_err(CheckoutError::storage("remove_item"))?;
        if removed == 0 {
            return Err(CartError::ItemNotFound {
                item_id: item_id.to_string(),
            }
            .into());
        }

        self.finish_mutation(tx, &mut cart, now, "remove_item").await
    }

    /// Deletes every line and detaches any discount.
    pub async fn clear(&self, cart_id: &str) -> CheckoutResult<CartView> {
        validate_id("cart id", cart_id)?;

        let now = Utc::now();
        let mut tx = self.begin("clear_cart").await?;
        let mut cart = self.load_active_cart(&mut *tx, cart_id).await?;

        let removed = tx
            .delete_cart_items(cart_id)
            .await
            .map_err(CheckoutError::storage("clear_cart"))?;
        cart.clear_discount();
        cart.touch(now);
        tx.update_cart(&cart)
            .await
            .map_err(CheckoutError::storage("clear_cart"))?;

        let view = self.build_view(&mut *tx, &cart).await?;
        Self::commit(tx, "clear_cart").await?;

        info!(cart_id = %cart_id, removed = removed, "Cart cleared");
        Ok(view)
    }

    // =========================================================================
    // Discounts
    // =========================================================================

    /// Applies a code to the cart. Usage is recorded in the same transaction.
    pub async fn apply_discount(&self, cart_id: &str, code: &str) -> CheckoutResult<CartView> {
        validate_id("cart id", cart_id)?;
        debug!(cart_id = %cart_id, code = %code, "Applying discount");

        let now = Utc::now();
        let mut tx = self.begin("apply_discount").await?;
        let mut cart = self.load_active_cart(&mut *tx, cart_id).await?;

        let discount = self.discounts.resolve(&mut *tx, code).await?;
        let subtotal = self.subtotal(&mut *tx, cart_id).await?;
        self.discounts
            .apply(&mut *tx, &mut cart, &discount, subtotal, now)
            .await?;

        cart.touch(now);
        tx.update_cart(&cart)
            .await
            .map_err(CheckoutError::storage("apply_discount"))?;

        let view = self.build_view(&mut *tx, &cart).await?;
        Self::commit(tx, "apply_discount").await?;

        info!(cart_id = %cart_id, code = %discount.code, amount = %view.discount, "Discount applied");
        Ok(view)
    }

    /// Detaches the code. Recorded usage is not released.
    pub async fn remove_discount(&self, cart_id: &str) -> CheckoutResult<CartView> {
        validate_id("cart id", cart_id)?;

        let now = Utc::now();
        let mut tx = self.begin("remove_discount").await?;
        let mut cart = self.load_active_cart(&mut *tx, cart_id).await?;

        cart.clear_discount();
        cart.touch(now);
        tx.update_cart(&cart)
            .await
            .map_err(CheckoutError::storage("remove_discount"))?;

        let view = self.build_view(&mut *tx, &cart).await?;
        Self::commit(tx, "remove_discount").await?;

        debug!(cart_id = %cart_id, "Discount removed");
        Ok(view)
    }

    // =========================================================================
    // Reads & Maintenance
    // =========================================================================

    /// The summarised view of a cart in any status.
    pub async fn summarize(&self, cart_id: &str) -> CheckoutResult<CartView> {
        validate_id("cart id", cart_id)?;

        let mut tx = self.begin("summarize").await?;
        let cart = tx
            .find_cart(cart_id)
            .await
            .map_err(CheckoutError::storage("summarize"))?
            .ok_or_else(|| CartError::NotFound {
                cart_id: cart_id.to_string(),
            })?;
        self.build_view(&mut *tx, &cart).await
    }

    /// Marks active carts idle for longer than the configured window as
    /// abandoned. Returns how many were swept.
    pub async fn abandon_stale(&self, now: DateTime<Utc>) -> CheckoutResult<usize> {
        let cutoff = now - Duration::hours(self.settings.abandon_after_hours);

        let mut tx = self.begin("abandon_stale").await?;
        let stale = tx
            .find_stale_carts(cutoff)
            .await
            .map_err(CheckoutError::storage("abandon_stale"))?;

        for mut cart in stale.iter().cloned() {
            cart.status = CartStatus::Abandoned;
            cart.updated_at = now;
            tx.update_cart(&cart)
                .await
                .map_err(CheckoutError::storage("abandon_stale"))?;
        }
        Self::commit(tx, "abandon_stale").await?;

        if !stale.is_empty() {
            info!(count = stale.len(), %cutoff, "Abandoned stale carts");
        }
        Ok(stale.len())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_active_cart(&self, tx: &mut dyn StoreTx, cart_id: &str) -> CheckoutResult<Cart> {
        let cart = tx
            .find_cart(cart_id)
            .await
            .map_err(CheckoutError::storage("find_cart"))?;

        match cart {
            Some(cart) if cart.is_active() => Ok(cart),
            _ => Err(CartError::NotFound {
                cart_id: cart_id.to_string(),
            }
            .into()),
        }
    }

    async fn load_item(&self, tx: &mut dyn StoreTx, item_id: &str) -> CheckoutResult<CartItem> {
        tx.find_cart_item(item_id)
            .await
            .map_err(CheckoutError::storage("find_cart_item"))?
            .ok_or_else(|| {
                CartError::ItemNotFound {
                    item_id: item_id.to_string(),
                }
                .into()
            })
    }

    async fn subtotal(&self, tx: &mut dyn StoreTx, cart_id: &str) -> CheckoutResult<Money> {
        let items = tx
            .list_cart_items(cart_id)
            .await
            .map_err(CheckoutError::storage("cart_subtotal"))?;
        Ok(items.iter().map(CartItem::line_total).sum())
    }

    /// Refreshes the discount, touches the cart, builds the view, commits.
    async fn finish_mutation(
        &self,
        mut tx: Box<dyn StoreTx>,
        cart: &mut Cart,
        now: DateTime<Utc>,
        operation: &'static str,
    ) -> CheckoutResult<CartView> {
        let subtotal = self.subtotal(&mut *tx, &cart.id).await?;
        self.discounts.refresh(&mut *tx, cart, subtotal, now).await?;

        cart.touch(now);
        tx.update_cart(cart)
            .await
            .map_err(CheckoutError::storage(operation))?;

        let view = self.build_view(&mut *tx, cart).await?;
        Self::commit(tx, operation).await?;
        Ok(view)
    }

    async fn build_view(&self, tx: &mut dyn StoreTx, cart: &Cart) -> CheckoutResult<CartView> {
        let items = tx
            .list_cart_items(&cart.id)
            .await
            .map_err(CheckoutError::storage("summarize"))?;

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            lines.push(self.line_view(tx, item).await?);
        }

        let summary = summarize_items(&items, cart.discount())
            .map_err(|e| ValidationError::invalid_format("cart", e.to_string()))?;

        Ok(CartView {
            cart_id: cart.id.clone(),
            session_id: cart.session_id.clone(),
            user_id: cart.user_id.clone(),
            status: cart.status,
            items: lines,
            discount_code: cart.discount_code.clone(),
            discount: summary.discount,
            shipping_discount: Money::from_cents(cart.shipping_discount_cents),
            subtotal: summary.subtotal,
            total: summary.total,
            item_count: summary.item_count,
        })
    }

    async fn line_view(&self, tx: &mut dyn StoreTx, item: &CartItem) -> CheckoutResult<CartLineView> {
        let variant = tx
            .find_variant(&item.variant_id)
            .await
            .map_err(CheckoutError::storage("summarize"))?;
        let product = tx
            .find_product(&item.product_id)
            .await
            .map_err(CheckoutError::storage("summarize"))?;

        let available = match &variant {
            Some(v) => ledger_available(tx, v)
                .await
                .map_err(CheckoutError::storage("summarize"))?,
            None => 0,
        };

        let (variant_name, sku, attributes) = match variant {
            Some(v) => (v.name, v.sku, v.attributes),
            None => (String::new(), String::new(), BTreeMap::new()),
        };
        let (product_name, product_slug, image) = match product {
            Some(p) => {
                let image = p.primary_image().map(str::to_string);
                (p.name, p.slug, image)
            }
            None => (String::new(), String::new(), None),
        };

        Ok(CartLineView {
            item_id: item.id.clone(),
            variant_id: item.variant_id.clone(),
            product_id: item.product_id.clone(),
            product_name,
            product_slug,
            variant_name,
            sku,
            image,
            attributes,
            quantity: item.quantity,
            unit_price: item.price(),
            line_total: item.line_total(),
            composites: item.composites.clone(),
            available,
            stock_status: self.stock.status(available),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
