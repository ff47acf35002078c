pub mod config;
pub mod config_loader;
pub mod events;
pub mod notifier;

pub use config::{AppConfig, DatabaseConfig, NotifierConfig, RetentionConfig, ServerConfig};
pub use config_loader::ConfigLoader;
pub use events::{ChangeEvent, ChangeKind};
pub use notifier::{ChangeNotifier, NotifierError, Subscription};
