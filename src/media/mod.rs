pub mod element;
pub mod resource;
pub mod sequence;

pub use element::{MediaElement, ReadyState};
pub use resource::VideoResource;
pub use sequence::FrameSequenceMedia;
