pub mod data;
pub mod facade;
pub mod health;
pub mod mock;
pub mod source;

pub use data::*;
pub use facade::{DataProviderFacade, DEFAULT_TIMEOUT, INDICATOR_TIMEOUT};
pub use health::{HealthState, SourceHealth, SourceHealthRegistry};
pub use source::MarketDataSource;
