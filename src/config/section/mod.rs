//! Configuration section definitions.

mod auth;
mod build;
mod components;
mod development;
mod plugins;
mod server;

pub use auth::{AuthConfig, AuthMode};
pub use build::BuildConfig;
pub use components::ComponentsConfig;
pub use development::DevelopmentConfig;
pub use plugins::PluginsConfig;
pub use server::ServerConfig;
