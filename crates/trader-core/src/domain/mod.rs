//! 도메인 모델.

mod bar;
mod date_range;
mod granularity;
mod identifier;
mod progress;
mod ticker_metadata;

pub use bar::{Bar, BarBuilder};
pub use date_range::{parse_date, DateRange, DATE_FORMAT};
pub use granularity::{Granularity, TimespanUnit};
pub use identifier::{Market, Ticker};
pub use progress::Progress;
pub use ticker_metadata::TickerMetadata;
