pub mod controller;
pub mod encoder;
pub mod loop_worker;

pub use controller::SamplerController;
pub use loop_worker::{SamplingContext, SAMPLE_INTERVAL};
