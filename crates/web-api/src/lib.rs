pub mod error;
pub mod handlers;
pub mod health;
pub mod legacy;
pub mod server;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use health::{HealthResponse, TableHealth};
pub use legacy::{LegacyLog, LegacyOrder};
pub use server::{ApiServer, AppState};
