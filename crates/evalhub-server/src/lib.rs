pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod join;
pub mod middleware;
pub mod observability;
pub mod resolver;
pub mod server;
pub mod storage_adapter;

pub use config::{AppConfig, BootstrapConfig, LoggingConfig, ServerConfig};
pub use join::{JoinError, JoinResourceHandler};
pub use observability::init_tracing;
pub use resolver::{RequestParams, ResolveAction, ResolveError, ResourceResolver};
pub use server::{AppState, EvalhubServer, ServerBuilder, build_app, router};
