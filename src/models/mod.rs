pub mod api;
pub mod frame;

pub use api::{HealthResponse, LoadModelResponse, PredictRequest, PredictResponse};
pub use frame::{Frame, Window};
