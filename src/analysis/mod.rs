pub mod correlation;
pub mod stats;
pub mod trend;

pub use correlation::{correlate, Correlation, CorrelationResult};
pub use trend::{fit_and_forecast, EntityForecast, IndexTrend, TrendModel, TrendResult};
