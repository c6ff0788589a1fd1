//! Series model, sampler and storage writers.
pub mod sampler;
pub mod series;
pub mod storage;
