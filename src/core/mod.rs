pub mod columns;
pub mod etl;
pub mod lookup;
pub mod normalize;
pub mod pipeline;
pub mod render;
pub mod spreadsheet;

pub use crate::domain::model::{ExtractResult, RunReport, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, QuoteProvider, Storage};
pub use crate::utils::error::Result;
