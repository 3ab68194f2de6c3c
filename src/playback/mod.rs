pub mod controller;
pub mod seek;
pub mod state;

pub use controller::{PlaybackController, PlaybackSnapshot};
pub use seek::{SeekBar, SeekMachine, SeekPhase};
pub use state::{PlaybackState, PlaybackStatus};
