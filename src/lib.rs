//! burndate - 用对话式二分查找定位火灾损毁最早可见的影像日期

pub mod bisect;
pub mod bot;
pub mod catalog;
pub mod config;
pub mod session;
pub mod telegram;

pub use bisect::{Bisector, CandidateImage};
pub use bot::BotRunner;
pub use catalog::{CatalogClient, CatalogConfig};
pub use config::AppConfig;
pub use session::{ChatId, SessionRegistry, VerdictOutcome};
pub use telegram::{classify, InboundEvent, TelegramClient, TelegramConfig};
