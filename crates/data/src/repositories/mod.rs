//! Repositories for the trading bot's persistent state.
//!
//! Each repository owns one table, validates input before touching storage
//! and publishes a change event after every successful mutation.

pub mod log_repo;
pub mod market_state_repo;
pub mod order_repo;
pub mod scanner_repo;
pub mod settings_repo;

pub use log_repo::LogRepository;
pub use market_state_repo::MarketStateRepository;
pub use order_repo::OrderRepository;
pub use scanner_repo::ScannerRepository;
pub use settings_repo::SettingsRepository;

use crate::database::Database;
use tradestate_core::ChangeNotifier;

/// Row count returned by list operations when the caller gives none.
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Upper bound on any list request.
pub const MAX_LIST_LIMIT: u32 = 1000;

pub(crate) fn clamp_limit(limit: u32) -> i64 {
    i64::from(limit.clamp(1, MAX_LIST_LIMIT))
}

/// Creates all repositories over one database handle and one notifier.
#[derive(Clone)]
pub struct Repositories {
    pub orders: OrderRepository,
    pub logs: LogRepository,
    pub market_state: MarketStateRepository,
    pub scanner: ScannerRepository,
    pub settings: SettingsRepository,
}

impl Repositories {
    /// Creates a new set of repositories sharing `db` and `notifier`.
    #[must_use]
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self {
            orders: OrderRepository::new(db.clone(), notifier.clone()),
            logs: LogRepository::new(db.clone(), notifier.clone()),
            market_state: MarketStateRepository::new(db.clone(), notifier.clone()),
            scanner: ScannerRepository::new(db.clone(), notifier.clone()),
            settings: SettingsRepository::new(db, notifier),
        }
    }
}
