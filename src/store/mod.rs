//! Persistence collaborators: users, menu, franchises, stores and orders.
//!
//! Franchise 1→N Store 1→N Order. Deleting a franchise removes its stores.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::password::PasswordError;
use crate::auth::RoleGrant;

pub use memory::MemoryStore;

pub type UserId = u64;
pub type FranchiseId = u64;
pub type StoreId = u64;
pub type MenuId = u64;
pub type OrderId = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email '{0}' is already registered")]
    DuplicateEmail(String),

    #[error("unknown user email '{0}'")]
    UnknownEmail(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("password task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ─── Domain types ────────────────────────────────────────────────

/// A user as seen by the rest of the service (never carries the password).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub roles: Vec<RoleGrant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<RoleGrant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuId,
    pub title: String,
    pub description: String,
    pub image: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMenuItem {
    pub title: String,
    pub description: String,
    pub image: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Franchise {
    pub id: FranchiseId,
    pub name: String,
    pub admins: Vec<FranchiseAdmin>,
    pub stores: Vec<FranchiseStore>,
}

impl Franchise {
    pub fn admin_emails(&self) -> Vec<String> {
        self.admins.iter().map(|a| a.email.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FranchiseAdmin {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FranchiseStore {
    pub id: StoreId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_id: MenuId,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub franchise_id: FranchiseId,
    pub store_id: StoreId,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub diner_id: UserId,
    pub franchise_id: FranchiseId,
    pub store_id: StoreId,
    pub date: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn total_price(&self) -> f64 {
        self.items.iter().map(|i| i.price).sum()
    }
}

// ─── Collaborator traits ─────────────────────────────────────────

/// Looked up by the session authority on login and register.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `None` when the email is unknown or the password does not match.
    async fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>>;

    async fn create(&self, user: NewUser) -> Result<User>;
}

#[async_trait]
pub trait PizzaRepository: Send + Sync {
    async fn menu(&self) -> Result<Vec<MenuItem>>;
    async fn add_menu_item(&self, item: NewMenuItem) -> Result<Vec<MenuItem>>;

    async fn franchises(&self) -> Result<Vec<Franchise>>;
    async fn user_franchises(&self, user_id: UserId) -> Result<Vec<Franchise>>;
    async fn franchise(&self, id: FranchiseId) -> Result<Franchise>;
    /// Admins are resolved by email and granted the franchisee role.
    async fn create_franchise(&self, name: String, admin_emails: Vec<String>) -> Result<Franchise>;
    async fn delete_franchise(&self, id: FranchiseId) -> Result<()>;

    async fn create_store(&self, franchise_id: FranchiseId, name: String) -> Result<FranchiseStore>;
    async fn delete_store(&self, franchise_id: FranchiseId, store_id: StoreId) -> Result<()>;

    async fn add_order(&self, diner_id: UserId, order: NewOrder) -> Result<Order>;
    async fn orders(&self, diner_id: UserId) -> Result<Vec<Order>>;
}
