pub mod credentials;
pub mod models;
pub mod orm;
pub mod pipeline;
pub mod router;
pub mod settings;
pub mod sheets;
pub mod store;
pub mod validation;

inventory::collect!(crate::orm::Migration);
