pub mod aggregate;
pub mod analysis;
pub mod config;
pub mod error;
pub mod load;
pub mod normalize;
pub mod pipeline;
pub mod table;

pub use error::{PipelineError, Result};
pub use table::{Table, TimeSeries};
