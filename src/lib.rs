//! Shop Manager Library
//!
//! Inventory, customers, sales, repair jobs, custom assemblies and user
//! accounts for a small computer shop, each persisted as its own flat record
//! file and mutated only through an atomic scan-rewrite.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod store;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::auth::{AuthService, PasswordPolicy};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::models::{Assembly, Customer, Product, Repair, Sale, User};
use crate::services::{
    assemblies::AssemblyService, backup::BackupService, customers::CustomerService,
    inventory::InventoryService, reports::ReportService, repairs::RepairService,
    sales::SalesService, users::UserService,
};
use crate::store::FlatFileStore;

pub use crate::errors::ServiceError;

/// One store per entity file plus the settings the services need.
///
/// Services are cheap handles over shared stores; build them on demand.
#[derive(Debug, Clone)]
pub struct Shop {
    products: Arc<FlatFileStore<Product>>,
    customers: Arc<FlatFileStore<Customer>>,
    sales: Arc<FlatFileStore<Sale>>,
    repairs: Arc<FlatFileStore<Repair>>,
    assemblies: Arc<FlatFileStore<Assembly>>,
    users: Arc<FlatFileStore<User>>,
    config: AppConfig,
}

impl Shop {
    /// Opens the shop rooted at `config.data_dir`, creating the directory if needed.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let data_dir: &Path = &config.data_dir;
        fs::create_dir_all(data_dir)?;
        info!(data_dir = %data_dir.display(), "opening shop data");

        Ok(Self {
            products: Arc::new(FlatFileStore::new(data_dir)),
            customers: Arc::new(FlatFileStore::new(data_dir)),
            sales: Arc::new(FlatFileStore::new(data_dir)),
            repairs: Arc::new(FlatFileStore::new(data_dir)),
            assemblies: Arc::new(FlatFileStore::new(data_dir)),
            users: Arc::new(FlatFileStore::new(data_dir)),
            config: config.clone(),
        })
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(Arc::clone(&self.users))
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(Arc::clone(&self.products))
    }

    pub fn customers(&self) -> CustomerService {
        CustomerService::new(Arc::clone(&self.customers))
    }

    pub fn sales(&self) -> SalesService {
        SalesService::new(
            Arc::clone(&self.sales),
            self.inventory(),
            Arc::clone(&self.customers),
        )
    }

    pub fn repairs(&self) -> RepairService {
        RepairService::new(Arc::clone(&self.repairs), Arc::clone(&self.customers))
    }

    pub fn assemblies(&self) -> AssemblyService {
        AssemblyService::new(Arc::clone(&self.assemblies), Arc::clone(&self.customers))
    }

    pub fn users(&self) -> UserService {
        UserService::new(Arc::clone(&self.users), self.password_policy())
    }

    pub fn reports(&self) -> ReportService {
        ReportService::new(Arc::clone(&self.products), Arc::clone(&self.sales))
    }

    pub fn backups(&self) -> BackupService {
        BackupService::new(self.config.data_dir.clone(), self.config.backup_path())
    }

    fn password_policy(&self) -> PasswordPolicy {
        self.config.password_policy()
    }
}
