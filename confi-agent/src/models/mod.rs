pub mod decision;
pub mod memory;
pub mod post;

pub use decision::{Decision, ResponseAction, ShouldRespond};
pub use memory::{MemoryContent, MemoryRecord};
pub use post::{MediaItem, Post, Profile, SenderProfile};
