use std::time::Instant;

use tracing::{info, warn};

use crate::auth::{Role, RoleGrant};
use crate::config::AdminSeed;
use crate::store::{NewMenuItem, NewUser, PizzaRepository, StoreError, UserRepository};

// ─── Default menu ────────────────────────────────────────────────

static MENU: &[(&str, &str, &str, f64)] = &[
    ("Veggie", "A garden of delight", "pizza1.png", 0.0038),
    ("Pepperoni", "Spicy treat", "pizza2.png", 0.0042),
    ("Margarita", "Essential classic", "pizza3.png", 0.0042),
    ("Crusty", "A dry mouthed favorite", "pizza4.png", 0.0028),
    ("Charred Leopard", "For those with a darker side", "pizza5.png", 0.0099),
];

// ─── Public entry point ──────────────────────────────────────────

/// Seeds the configured admin account and, when the menu is empty, the
/// default menu. Re-seeding an existing admin is logged and skipped.
pub async fn seed(
    users: &dyn UserRepository,
    pizzas: &dyn PizzaRepository,
    admin: Option<&AdminSeed>,
) -> Result<(), StoreError> {
    let start = Instant::now();

    if let Some(admin) = admin {
        seed_admin(users, admin).await?;
    }
    let items = seed_menu(pizzas).await?;

    info!(
        menu_items = items,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "seed complete"
    );
    Ok(())
}

async fn seed_admin(users: &dyn UserRepository, admin: &AdminSeed) -> Result<(), StoreError> {
    let created = users
        .create(NewUser {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
            roles: vec![RoleGrant::global(Role::Admin)],
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = user.id, email = %user.email, "seeded admin");
            Ok(())
        }
        Err(StoreError::DuplicateEmail(email)) => {
            warn!(%email, "admin already exists, skipping");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn seed_menu(pizzas: &dyn PizzaRepository) -> Result<usize, StoreError> {
    let existing = pizzas.menu().await?;
    if !existing.is_empty() {
        return Ok(existing.len());
    }

    let mut len = 0;
    for (title, description, image, price) in MENU {
        len = pizzas
            .add_menu_item(NewMenuItem {
                title: (*title).into(),
                description: (*description).into(),
                image: (*image).into(),
                price: *price,
            })
            .await?
            .len();
    }
    Ok(len)
}
