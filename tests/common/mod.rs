#![allow(dead_code)]

use std::path::PathBuf;

use rust_decimal::Decimal;
use shop_manager::{
    auth::Session,
    config::AppConfig,
    models::{Customer, NewCustomer, NewProduct, NewUser, Permissions, Product},
    Shop,
};
use tempfile::TempDir;

pub const ADMIN_PASSWORD: &str = "admin";

/// Helper harness for a shop backed by a throwaway data directory with the
/// bootstrap administrator already logged in.
pub struct TestShop {
    dir: TempDir,
    pub shop: Shop,
    pub admin: Session,
}

impl TestShop {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::for_data_dir(dir.path());
        let shop = Shop::open(&config).expect("open shop");
        shop.auth()
            .ensure_default_user(&config.default_admin())
            .expect("bootstrap admin");
        let admin = shop
            .auth()
            .login("admin", ADMIN_PASSWORD)
            .expect("admin login");
        Self { dir, shop, admin }
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn read(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.file(name)).unwrap_or_default()
    }

    /// Creates an account with `permissions` and returns a session for it.
    pub fn login_as(&self, username: &str, permissions: Permissions) -> Session {
        let password = format!("{}-pass", username);
        self.shop
            .users()
            .add_user(
                &self.admin,
                NewUser {
                    username: username.to_string(),
                    password: password.clone(),
                    permissions,
                },
            )
            .expect("add user");
        self.shop
            .auth()
            .login(username, &password)
            .expect("user login")
    }

    pub fn add_product(&self, name: &str, cost: Decimal, price: Decimal, stock: u32) -> Product {
        self.shop
            .inventory()
            .add_product(
                &self.admin,
                NewProduct {
                    name: name.to_string(),
                    category: "Peripherals".to_string(),
                    brand: "Acme".to_string(),
                    cost_price: cost,
                    sell_price: price,
                    stock,
                    min_stock_level: 2,
                },
            )
            .expect("add product")
    }

    pub fn add_customer(&self, name: &str) -> Customer {
        self.shop
            .customers()
            .add_customer(
                &self.admin,
                NewCustomer {
                    name: name.to_string(),
                    phone: "555-0100".to_string(),
                    email: format!("{}@example.com", name.to_lowercase()),
                    address: "1 Main St".to_string(),
                },
            )
            .expect("add customer")
    }
}
