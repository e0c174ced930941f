pub mod account_ledger;
pub mod api;
pub mod configure;
pub mod engine;
pub mod gateway;
pub mod logger;
pub mod models;
pub mod order_store;
pub mod signature;
pub mod utils;
