mod database {
    pub mod actions;
    pub mod error;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod recipes {
    pub mod image;
    pub mod shopping_list;
    pub mod validation;
}
pub mod api {
    pub mod handlers;
    pub mod rejection;
    pub mod routes;
    pub mod types;
}
mod config;
mod constants;
mod state;

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use recipes::*;
pub use state::*;
