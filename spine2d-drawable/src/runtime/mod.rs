mod animation_state;
mod skeleton;

pub use animation_state::*;
pub use skeleton::*;
