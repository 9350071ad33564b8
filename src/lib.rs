pub mod benchmark;
pub mod benchmark_utils;
pub mod compressor;
pub mod dataset;
pub mod error;
pub mod interrupt;
pub mod measure;
pub mod prerequisites;
pub mod ratio;
pub mod run;

pub use error::{Error, Result};
