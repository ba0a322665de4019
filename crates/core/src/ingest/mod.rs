pub mod csv_line;
pub mod fantasycalc;
pub mod fetch;
pub mod ktc;
pub mod underdog;

pub use fetch::{HttpFetcher, SourceFetcher};
