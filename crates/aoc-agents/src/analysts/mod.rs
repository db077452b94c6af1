pub mod intl_news_analyst;
pub mod macro_analyst;
pub mod policy_analyst;
pub mod sector_analyst;
pub mod strategy_advisor;
pub mod technical_analyst;

pub use intl_news_analyst::IntlNewsAnalyst;
pub use macro_analyst::MacroAnalyst;
pub use policy_analyst::PolicyAnalyst;
pub use sector_analyst::SectorAnalyst;
pub use technical_analyst::TechnicalAnalyst;
