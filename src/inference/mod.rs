pub mod actor;
pub mod dispatcher;
pub mod service;

pub use actor::{spawn_result_actor, ResultCommand, ResultHandle, ResultSnapshot, NOT_PREDICTED};
pub use dispatcher::InferenceDispatcher;
pub use service::{HttpInferenceClient, InferenceService};
