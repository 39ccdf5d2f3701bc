pub mod api;
pub mod config;
pub mod error;
pub mod factory;
pub mod state;
pub mod tenant;

pub use config::VaultlogConfig;
pub use error::ServerError;
pub use state::AppState;
