pub mod connection;

pub use connection::{BackendConnection, ConnectionState, PredictTarget};
