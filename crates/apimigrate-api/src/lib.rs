pub mod error;
pub mod handlers;
pub mod metrics;
pub mod migration_handlers;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;
pub mod swagger_handlers;

pub use error::*;
pub use openapi::ApiDoc;
pub use routes::*;
pub use server::*;
pub use state::*;
