//! 백필 엔진 모듈.

pub mod calendar;
pub mod coordinator;
pub mod ingestor;
pub mod scheduler;

pub use calendar::MarketCalendar;
pub use coordinator::BackfillCoordinator;
pub use ingestor::{EngineContext, IngestState, TickerIngestor};
pub use scheduler::{MarketHours, MarketStatus, Scheduler};
