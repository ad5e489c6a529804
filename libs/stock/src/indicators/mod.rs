pub mod chart;
pub mod technical;

pub use technical::{Bands, IndicatorPoint, IndicatorSeries, calculate};
