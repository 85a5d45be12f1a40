//! 과거 바 백필 엔진.
//!
//! 설정된 종목마다 [`TickerIngestor`]를 하나씩 실행하며, [`BackfillCoordinator`]가
//! 동시 실행 수를 제한하고 결과를 [`RunReport`]로 모읍니다.
//!
//! ```text
//! BackfillCoordinator
//! └── TickerIngestor × N (세마포어로 K개까지 동시 실행)
//!     ├── MarketCalendar      (거래일 판정)
//!     ├── ProgressStore       (체크포인트 조회/기록)
//!     ├── MarketDataProvider  (메타데이터/바 조회, 공유 RequestBudget)
//!     └── BarRepository       (멱등 저장)
//! ```

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::{BackfillConfig, IngestPlan};
pub use error::{CollectorError, Result};
pub use modules::{
    BackfillCoordinator, EngineContext, IngestState, MarketCalendar, MarketHours, MarketStatus,
    Scheduler, TickerIngestor,
};
pub use stats::{IngestionOutcome, OutcomeStatus, RunReport, RunStatus};
