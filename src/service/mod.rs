pub mod account_ops;
pub mod legacy_loader;
