pub mod aggregator;
pub mod period;

pub use aggregator::{aggregate, available_periods, bet_profit, compute_stats, Aggregation, Selection};
pub use period::Granularity;
