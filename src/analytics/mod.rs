//! Analytics computed from stored metrics: per-channel aggregates, refresh
//! deltas, dashboard grouping and the CSV export.

pub mod aggregates;
pub mod dashboard;
pub mod export;

pub use aggregates::{AggregateDelta, ChannelAggregates};
pub use dashboard::{ChannelReport, ChartRow, DayDelta, PlatformGroup};
