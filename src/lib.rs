pub mod config;
pub mod db;
pub mod error;
pub mod service;

#[cfg(test)]
mod testing;

pub use db::{Account, MetadataPatch, NewAccount, StatusFilter};
pub use error::VaultError;
pub use service::account_ops::AccountOps;
