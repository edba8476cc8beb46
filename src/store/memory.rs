use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::*;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{Role, RoleGrant};

/// Process-local store. Everything lives behind one mutex that is never
/// held across an await. Password hashing runs on the blocking pool.
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    next_id: u64,
    users: BTreeMap<UserId, UserRow>,
    menu: Vec<MenuItem>,
    franchises: BTreeMap<FranchiseId, FranchiseRow>,
    orders: Vec<Order>,
}

struct UserRow {
    user: User,
    password_hash: String,
}

struct FranchiseRow {
    name: String,
    admin_ids: Vec<UserId>,
    stores: Vec<FranchiseStore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tables impl ─────────────────────────────────────────────────

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_by_email(&self, email: &str) -> Option<&UserRow> {
        self.users
            .values()
            .find(|row| row.user.email.eq_ignore_ascii_case(email))
    }

    fn franchise_row(&self, id: FranchiseId) -> Result<&FranchiseRow> {
        self.franchises
            .get(&id)
            .ok_or(StoreError::NotFound { kind: "franchise", id })
    }

    fn franchise_view(&self, id: FranchiseId, row: &FranchiseRow) -> Franchise {
        let admins = row
            .admin_ids
            .iter()
            .filter_map(|uid| self.users.get(uid))
            .map(|u| FranchiseAdmin {
                id: u.user.id,
                name: u.user.name.clone(),
                email: u.user.email.clone(),
            })
            .collect();

        Franchise {
            id,
            name: row.name.clone(),
            admins,
            stores: row.stores.clone(),
        }
    }
}

// ─── UserRepository ──────────────────────────────────────────────

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let found = {
            let tables = self.inner.lock();
            tables
                .user_by_email(email)
                .map(|row| (row.user.clone(), row.password_hash.clone()))
        };

        let Some((user, hash)) = found else {
            return Ok(None);
        };
        let password = password.to_owned();
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
        Ok(matches.then_some(user))
    }

    async fn create(&self, new: NewUser) -> Result<User> {
        let password = new.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

        let mut tables = self.inner.lock();
        if tables.user_by_email(&new.email).is_some() {
            return Err(StoreError::DuplicateEmail(new.email));
        }

        let roles = if new.roles.is_empty() {
            vec![RoleGrant::global(Role::Diner)]
        } else {
            new.roles
        };
        let user = User {
            id: tables.next_id(),
            name: new.name,
            email: new.email,
            roles,
        };
        tables.users.insert(
            user.id,
            UserRow {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }
}

// ─── PizzaRepository ─────────────────────────────────────────────

#[async_trait]
impl PizzaRepository for MemoryStore {
    async fn menu(&self) -> Result<Vec<MenuItem>> {
        Ok(self.inner.lock().menu.clone())
    }

    async fn add_menu_item(&self, item: NewMenuItem) -> Result<Vec<MenuItem>> {
        let mut tables = self.inner.lock();
        let id = tables.next_id();
        tables.menu.push(MenuItem {
            id,
            title: item.title,
            description: item.description,
            image: item.image,
            price: item.price,
        });
        Ok(tables.menu.clone())
    }

    async fn franchises(&self) -> Result<Vec<Franchise>> {
        let tables = self.inner.lock();
        Ok(tables
            .franchises
            .iter()
            .map(|(id, row)| tables.franchise_view(*id, row))
            .collect())
    }

    async fn user_franchises(&self, user_id: UserId) -> Result<Vec<Franchise>> {
        let tables = self.inner.lock();
        Ok(tables
            .franchises
            .iter()
            .filter(|(_, row)| row.admin_ids.contains(&user_id))
            .map(|(id, row)| tables.franchise_view(*id, row))
            .collect())
    }

    async fn franchise(&self, id: FranchiseId) -> Result<Franchise> {
        let tables = self.inner.lock();
        let row = tables.franchise_row(id)?;
        Ok(tables.franchise_view(id, row))
    }

    async fn create_franchise(&self, name: String, admin_emails: Vec<String>) -> Result<Franchise> {
        let mut tables = self.inner.lock();

        let mut admin_ids = Vec::with_capacity(admin_emails.len());
        for email in admin_emails {
            match tables.user_by_email(&email) {
                Some(row) => admin_ids.push(row.user.id),
                None => return Err(StoreError::UnknownEmail(email)),
            }
        }

        let id = tables.next_id();
        for uid in &admin_ids {
            if let Some(row) = tables.users.get_mut(uid) {
                row.user.roles.push(RoleGrant::franchisee(id));
            }
        }
        let row = FranchiseRow {
            name,
            admin_ids,
            stores: Vec::new(),
        };
        let view = tables.franchise_view(id, &row);
        tables.franchises.insert(id, row);
        Ok(view)
    }

    async fn delete_franchise(&self, id: FranchiseId) -> Result<()> {
        let mut tables = self.inner.lock();
        if tables.franchises.remove(&id).is_none() {
            return Err(StoreError::NotFound { kind: "franchise", id });
        }
        let grant = RoleGrant::franchisee(id);
        for row in tables.users.values_mut() {
            row.user.roles.retain(|g| *g != grant);
        }
        Ok(())
    }

    async fn create_store(&self, franchise_id: FranchiseId, name: String) -> Result<FranchiseStore> {
        let mut tables = self.inner.lock();
        tables.franchise_row(franchise_id)?;

        let store = FranchiseStore {
            id: tables.next_id(),
            name,
        };
        if let Some(row) = tables.franchises.get_mut(&franchise_id) {
            row.stores.push(store.clone());
        }
        Ok(store)
    }

    async fn delete_store(&self, franchise_id: FranchiseId, store_id: StoreId) -> Result<()> {
        let mut tables = self.inner.lock();
        let row = tables
            .franchises
            .get_mut(&franchise_id)
            .ok_or(StoreError::NotFound { kind: "franchise", id: franchise_id })?;

        let before = row.stores.len();
        row.stores.retain(|s| s.id != store_id);
        if row.stores.len() == before {
            return Err(StoreError::NotFound { kind: "store", id: store_id });
        }
        Ok(())
    }

    async fn add_order(&self, diner_id: UserId, order: NewOrder) -> Result<Order> {
        let mut tables = self.inner.lock();
        let row = tables.franchise_row(order.franchise_id)?;
        if !row.stores.iter().any(|s| s.id == order.store_id) {
            return Err(StoreError::NotFound { kind: "store", id: order.store_id });
        }

        let order = Order {
            id: tables.next_id(),
            diner_id,
            franchise_id: order.franchise_id,
            store_id: order.store_id,
            date: Utc::now(),
            items: order.items,
        };
        tables.orders.push(order.clone());
        Ok(order)
    }

    async fn orders(&self, diner_id: UserId) -> Result<Vec<Order>> {
        let tables = self.inner.lock();
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.diner_id == diner_id)
            .cloned()
            .collect())
    }
}
