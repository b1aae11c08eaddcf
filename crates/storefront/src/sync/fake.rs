//! In-process stand-in for the remote API with server-side semantics.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chainline_core::{BicycleId, CartItemId, CurrencyCode, PartId, WishlistItemId};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::Notify;

use crate::api::{
    ApiError, AuthToken, Bicycle, Cart, CartApi, CartItem, CartItemInput, CatalogApi, Merchandise,
    Part, Service, Wishlist, WishlistApi, WishlistItem,
};

/// Failure to inject into the next mutation call.
#[derive(Debug, Clone)]
pub enum Failure {
    Validation(String),
    Unauthorized,
    Unavailable,
}

impl From<Failure> for ApiError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Validation(message) => Self::Validation(message),
            Failure::Unauthorized => Self::Unauthorized,
            Failure::Unavailable => Self::Api {
                status: 503,
                message: "service unavailable".to_string(),
            },
        }
    }
}

/// Pauses the next `add_cart_item` or `add_wishlist_item` call until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
struct ServerState {
    cart: Cart,
    wishlist: Wishlist,
    next_id: i32,
}

#[derive(Default)]
pub struct FakeApi {
    server: Mutex<ServerState>,
    bicycles: Vec<Bicycle>,
    parts: Vec<Part>,
    failures: Mutex<VecDeque<Failure>>,
    gate: Mutex<Option<Arc<Gate>>>,
    pub cart_fetches: AtomicUsize,
    pub wishlist_fetches: AtomicUsize,
}

pub fn bicycle(id: i32, price: i64, stock: u32) -> Bicycle {
    Bicycle {
        id: BicycleId::new(id),
        name: format!("Bicycle {id}"),
        brand: "Chainline".to_string(),
        category: "gravel".to_string(),
        description: None,
        price: Decimal::from(price),
        stock,
        image_url: None,
    }
}

pub fn part(id: i32, price: i64, stock: u32) -> Part {
    Part {
        id: PartId::new(id),
        name: format!("Part {id}"),
        category: "drivetrain".to_string(),
        compatibility: vec!["gravel".to_string()],
        price: Decimal::from(price),
        stock,
        image_url: None,
    }
}

pub fn token() -> AuthToken {
    AuthToken::new("tok_test")
}

impl FakeApi {
    pub fn with_catalog(bicycles: Vec<Bicycle>, parts: Vec<Part>) -> Self {
        Self {
            bicycles,
            parts,
            ..Self::default()
        }
    }

    /// Make the next mutation calls fail, in order.
    pub fn fail_next(&self, failure: Failure) {
        self.failures.lock().push_back(failure);
    }

    /// Install a gate that pauses the next cart or wishlist add.
    pub fn gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// The cart as the server holds it.
    pub fn server_cart(&self) -> Cart {
        self.server.lock().cart.clone()
    }

    /// The wishlist as the server holds it.
    pub fn server_wishlist(&self) -> Wishlist {
        self.server.lock().wishlist.clone()
    }

    /// Seed a cart line directly on the server.
    pub fn seed_cart(&self, merchandise: Merchandise, quantity: u32) -> CartItemId {
        let (name, price, stock) = self.describe(merchandise);
        let mut server = self.server.lock();
        server.next_id += 1;
        let id = CartItemId::new(server.next_id);
        server.cart.items.push(CartItem {
            id,
            merchandise,
            name,
            unit_price: price,
            quantity,
            stock: Some(stock),
            image_url: None,
        });
        recompute(&mut server.cart);
        id
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }

    fn take_failure(&self) -> Result<(), ApiError> {
        self.failures
            .lock()
            .pop_front()
            .map_or(Ok(()), |failure| Err(failure.into()))
    }

    fn describe(&self, merchandise: Merchandise) -> (String, Decimal, u32) {
        match merchandise {
            Merchandise::Bicycle(id) => self
                .bicycles
                .iter()
                .find(|b| b.id == id)
                .map_or((String::new(), Decimal::ZERO, 0), |b| {
                    (b.name.clone(), b.price, b.stock)
                }),
            Merchandise::Part(id) => self
                .parts
                .iter()
                .find(|p| p.id == id)
                .map_or((String::new(), Decimal::ZERO, 0), |p| {
                    (p.name.clone(), p.price, p.stock)
                }),
        }
    }
}

fn recompute(cart: &mut Cart) {
    cart.subtotal = cart.items.iter().map(CartItem::line_total).sum();
    cart.item_count = cart.items.iter().map(|i| i.quantity).sum();
    cart.currency = CurrencyCode::USD;
}

#[async_trait]
impl CartApi for FakeApi {
    async fn fetch_cart(&self, _token: &AuthToken) -> Result<Cart, ApiError> {
        self.cart_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.server_cart())
    }

    async fn add_cart_item(
        &self,
        _token: &AuthToken,
        input: CartItemInput,
    ) -> Result<Cart, ApiError> {
        self.pass_gate().await;
        self.take_failure()?;

        let (name, price, stock) = self.describe(input.merchandise);
        let mut server = self.server.lock();
        if let Some(item) = server
            .cart
            .items
            .iter_mut()
            .find(|i| i.merchandise == input.merchandise)
        {
            item.quantity += input.quantity;
        } else {
            server.next_id += 1;
            let id = CartItemId::new(server.next_id);
            server.cart.items.push(CartItem {
                id,
                merchandise: input.merchandise,
                name,
                unit_price: price,
                quantity: input.quantity,
                stock: Some(stock),
                image_url: None,
            });
        }
        recompute(&mut server.cart);
        Ok(server.cart.clone())
    }

    async fn update_cart_item(
        &self,
        _token: &AuthToken,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        self.take_failure()?;
        let mut server = self.server.lock();
        let item = server
            .cart
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| ApiError::NotFound(format!("cart item {item_id}")))?;
        item.quantity = quantity;
        recompute(&mut server.cart);
        Ok(server.cart.clone())
    }

    async fn remove_cart_item(
        &self,
        _token: &AuthToken,
        item_id: CartItemId,
    ) -> Result<Cart, ApiError> {
        self.take_failure()?;
        let mut server = self.server.lock();
        server.cart.items.retain(|i| i.id != item_id);
        recompute(&mut server.cart);
        Ok(server.cart.clone())
    }

    async fn clear_cart(&self, _token: &AuthToken) -> Result<Cart, ApiError> {
        self.take_failure()?;
        let mut server = self.server.lock();
        server.cart.items.clear();
        recompute(&mut server.cart);
        Ok(server.cart.clone())
    }
}

#[async_trait]
impl WishlistApi for FakeApi {
    async fn fetch_wishlist(&self, _token: &AuthToken) -> Result<Wishlist, ApiError> {
        self.wishlist_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.server_wishlist())
    }

    async fn add_wishlist_item(
        &self,
        _token: &AuthToken,
        bicycle_id: BicycleId,
    ) -> Result<Wishlist, ApiError> {
        self.pass_gate().await;
        self.take_failure()?;
        let (name, price, _) = self.describe(Merchandise::Bicycle(bicycle_id));
        let mut server = self.server.lock();
        if server.wishlist.items.iter().any(|i| i.bicycle_id == bicycle_id) {
            return Err(ApiError::Validation("Already in your wishlist".to_string()));
        }
        server.next_id += 1;
        let id = WishlistItemId::new(server.next_id);
        server.wishlist.items.push(WishlistItem {
            id,
            bicycle_id,
            name,
            price,
            added_at: Utc::now(),
            image_url: None,
        });
        Ok(server.wishlist.clone())
    }

    async fn remove_wishlist_item(
        &self,
        _token: &AuthToken,
        item_id: WishlistItemId,
    ) -> Result<Wishlist, ApiError> {
        self.take_failure()?;
        let mut server = self.server.lock();
        server.wishlist.items.retain(|i| i.id != item_id);
        Ok(server.wishlist.clone())
    }
}

#[async_trait]
impl CatalogApi for FakeApi {
    async fn bicycles(&self) -> Result<Vec<Bicycle>, ApiError> {
        Ok(self.bicycles.clone())
    }

    async fn bicycle(&self, id: BicycleId) -> Result<Bicycle, ApiError> {
        self.bicycles
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("bicycle {id}")))
    }

    async fn parts(&self) -> Result<Vec<Part>, ApiError> {
        Ok(self.parts.clone())
    }

    async fn part(&self, id: PartId) -> Result<Part, ApiError> {
        self.parts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("part {id}")))
    }

    async fn services(&self) -> Result<Vec<Service>, ApiError> {
        Ok(Vec::new())
    }
}
