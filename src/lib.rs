mod database {
    pub mod actions;
    pub mod catalog;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
    pub mod shopping_list;
    pub mod validation;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod server {
    pub mod filters;
    pub mod handlers;
    pub mod rejection;
    pub mod state;
}
pub mod config;
mod constants;
pub mod media;

pub use authentication::*;
pub use constants::*;
pub use database::*;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
