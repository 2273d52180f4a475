//! Renderer-agnostic drawable core for Spine skeletons.
//!
//! Turns a posed [`Skeleton`] into a linked list of [`RenderCommand`]s (flat-tinted, indexed
//! triangle batches per blend mode and atlas page), clipping them against clipping attachments,
//! and drives an [`AnimationState`] whose lifecycle and user events are recorded in an
//! [`EventBuffer`]. [`SkeletonDrawable`] ties the pieces together.

#![forbid(unsafe_code)]

mod atlas;
mod attachment;
mod clipping;
mod command;
mod config;
mod drawable;
mod error;
mod events;
pub mod geometry;
mod model;
mod render;
mod runtime;

pub use atlas::*;
pub use clipping::*;
pub use command::*;
pub use config::*;
pub use drawable::*;
pub use error::*;
pub use events::*;
pub use model::*;
pub use render::*;
pub use runtime::*;

#[cfg(test)]
mod test_util;

#[cfg(test)]
mod geometry_tests;



#[cfg(test)]
mod attachment_tests;

#[cfg(test)]
mod render_tests;
