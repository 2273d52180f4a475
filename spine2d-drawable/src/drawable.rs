use crate::{
    AnimationApplier, AnimationState, AnimationStateData, CommandAllocator, DrawableConfig,
    EventBuffer, RenderCommand, Skeleton, SkeletonData, SkeletonRenderer,
};
use std::sync::Arc;

/// A skeleton instance together with its animation state, event buffer and render output.
///
/// Every frame: [`SkeletonDrawable::update`] (or [`SkeletonDrawable::update_with`]), pose the
/// skeleton's world transforms, then [`SkeletonDrawable::render`]. The command list returned by
/// `render` is owned by the drawable and is disposed by the next `render` call.
#[derive(Debug)]
pub struct SkeletonDrawable {
    skeleton: Skeleton,
    state: AnimationState,
    events: EventBuffer,
    renderer: SkeletonRenderer,
    commands: Option<Box<RenderCommand>>,
}

impl SkeletonDrawable {
    pub fn new(data: Arc<SkeletonData>, config: DrawableConfig) -> Self {
        Self::with_allocator(data, config, CommandAllocator::new())
    }

    pub fn with_allocator(
        data: Arc<SkeletonData>,
        config: DrawableConfig,
        allocator: CommandAllocator,
    ) -> Self {
        let skeleton = Skeleton::new(data.clone());
        let mut state_data = AnimationStateData::new(data);
        state_data.default_mix = config.default_mix;
        let mut state = AnimationState::new(state_data);
        state.set_time_scale(config.time_scale);
        state.set_manual_track_entry_disposal(config.manual_track_entry_disposal);
        Self {
            skeleton,
            state,
            events: EventBuffer::new(),
            renderer: SkeletonRenderer::new(allocator),
            commands: None,
        }
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    pub fn animation_state(&self) -> &AnimationState {
        &self.state
    }

    pub fn animation_state_mut(&mut self) -> &mut AnimationState {
        &mut self.state
    }

    pub fn allocator(&self) -> &CommandAllocator {
        self.renderer.allocator()
    }

    /// Advances the animation state, applies it with no timeline evaluation and records the
    /// raised events.
    pub fn update(&mut self, delta: f32) {
        self.update_with(delta, &mut ());
    }

    /// Advances the animation state and applies it through `applier`. Events raised by the update
    /// and the apply are appended to [`Self::events`].
    pub fn update_with<A: AnimationApplier + ?Sized>(&mut self, delta: f32, applier: &mut A) {
        self.state.update(delta);
        self.state.apply(&mut self.skeleton, applier);
        self.state.drain_events(&mut self.events);
    }

    /// Builds this frame's command list, disposing the previous frame's list first.
    pub fn render(&mut self) -> Option<&RenderCommand> {
        self.renderer.allocator().dispose_list(self.commands.take());
        self.commands = self.renderer.render(&self.skeleton);
        self.commands.as_deref()
    }

    /// The command list built by the last [`Self::render`] call.
    pub fn commands(&self) -> Option<&RenderCommand> {
        self.commands.as_deref()
    }

    pub fn events(&self) -> &EventBuffer {
        &self.events
    }

    /// Clears the recorded events. Call once per frame after consuming them.
    pub fn flush_events(&mut self) {
        self.events.reset();
    }

    /// Tears the drawable down. Returns the number of track entries freed.
    pub fn dispose(mut self) -> usize {
        self.teardown()
    }

    fn teardown(&mut self) -> usize {
        self.renderer.allocator().dispose_list(self.commands.take());
        self.state.clear_tracks();
        self.state.drain_events(&mut self.events);
        let freed = self.state.dispose_retired_entries();
        if self.state.live_entries() > 0 {
            log::warn!(
                "{} track entries still live after drawable teardown",
                self.state.live_entries()
            );
        }
        freed
    }
}

impl Drop for SkeletonDrawable {
    fn drop(&mut self) {
        self.teardown();
    }
}
