use crate::{Animation, Error, Event, Skeleton, SkeletonData};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum MixBlend {
    Setup,
    First,
    #[default]
    Replace,
    Add,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixDirection {
    In,
    Out,
}

/// Lifecycle and user events raised by [`AnimationState`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum EventType {
    Start,
    Interrupt,
    End,
    Dispose,
    Complete,
    Event,
}

/// Receives queued events from [`AnimationState::drain_events`].
pub trait AnimationStateListener {
    fn on_event(&mut self, kind: EventType, entry: TrackEntryHandle, event: Option<&Event>);
}

impl<F> AnimationStateListener for F
where
    F: FnMut(EventType, TrackEntryHandle, Option<&Event>),
{
    fn on_event(&mut self, kind: EventType, entry: TrackEntryHandle, event: Option<&Event>) {
        self(kind, entry, event)
    }
}

/// One animation application requested by [`AnimationState::apply`].
#[derive(Clone, Debug)]
pub struct AppliedAnimation<'a> {
    pub entry: TrackEntryHandle,
    pub track_index: usize,
    pub animation: &'a Animation,
    pub last_time: f32,
    pub time: f32,
    pub looped: bool,
    pub alpha: f32,
    pub blend: MixBlend,
    pub direction: MixDirection,
    /// Whether attachment timelines should be applied.
    pub attachments: bool,
    /// Whether the draw order timeline should be applied.
    pub draw_order: bool,
}

/// Applies animation timelines to a skeleton. Timeline evaluation lives outside this crate;
/// [`AnimationState`] only decides what to apply, when, and with which weight.
pub trait AnimationApplier {
    fn apply_animation(&mut self, skeleton: &mut Skeleton, applied: &AppliedAnimation<'_>);
}

impl AnimationApplier for () {
    fn apply_animation(&mut self, _skeleton: &mut Skeleton, _applied: &AppliedAnimation<'_>) {}
}

/// Stable reference to a track entry. Becomes stale (resolves to `None`) once the entry is
/// disposed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TrackEntryHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct EntrySlot {
    generation: u32,
    entry: Option<TrackEntry>,
}

#[derive(Clone, Debug)]
pub struct AnimationStateData {
    pub skeleton_data: Arc<SkeletonData>,
    pub default_mix: f32,
    mixes: HashMap<(usize, usize), f32>,
}

impl AnimationStateData {
    pub fn new(skeleton_data: Arc<SkeletonData>) -> Self {
        Self {
            skeleton_data,
            default_mix: 0.0,
            mixes: HashMap::new(),
        }
    }

    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        if duration.is_nan() || duration < 0.0 {
            return Err(Error::InvalidValue {
                message: "mix duration must be finite and >= 0".to_string(),
            });
        }
        let Some((from_index, _)) = self.skeleton_data.animation(from) else {
            return Err(Error::UnknownAnimation {
                name: from.to_string(),
            });
        };
        let Some((to_index, _)) = self.skeleton_data.animation(to) else {
            return Err(Error::UnknownAnimation {
                name: to.to_string(),
            });
        };
        self.mixes.insert((from_index, to_index), duration);
        Ok(())
    }

    /// Mix duration between two animations. The empty animation (`None`) always uses the
    /// default mix.
    pub fn mix_duration(&self, from: Option<usize>, to: Option<usize>) -> f32 {
        match (from, to) {
            (Some(from), Some(to)) => self
                .mixes
                .get(&(from, to))
                .copied()
                .unwrap_or(self.default_mix),
            _ => self.default_mix,
        }
    }
}

/// One animation playing (or queued) on a track.
#[derive(Clone, Debug)]
pub struct TrackEntry {
    track_index: usize,
    /// Index into the skeleton data's animations; `None` for the empty animation.
    animation_index: Option<usize>,
    animation: Arc<Animation>,
    pub looped: bool,
    pub reverse: bool,
    pub hold_previous: bool,

    pub delay: f32,
    pub track_time: f32,
    pub track_end: f32,
    pub time_scale: f32,
    pub alpha: f32,

    pub animation_start: f32,
    pub animation_end: f32,
    animation_last: f32,
    next_animation_last: f32,
    track_last: f32,
    next_track_last: f32,

    pub mix_time: f32,
    pub mix_duration: f32,
    pub mix_blend: MixBlend,
    interrupt_alpha: f32,
    total_alpha: f32,

    pub event_threshold: f32,
    pub mix_attachment_threshold: f32,
    pub alpha_attachment_threshold: f32,
    pub mix_draw_order_threshold: f32,

    previous: Option<TrackEntryHandle>,
    next: Option<TrackEntryHandle>,
    mixing_from: Option<TrackEntryHandle>,
    mixing_to: Option<TrackEntryHandle>,
    retired: bool,
}

impl TrackEntry {
    fn new(
        track_index: usize,
        animation_index: Option<usize>,
        animation: Arc<Animation>,
        looped: bool,
        mix_duration: f32,
    ) -> Self {
        Self {
            track_index,
            animation_index,
            looped,
            reverse: false,
            hold_previous: false,
            delay: 0.0,
            track_time: 0.0,
            track_end: f32::MAX,
            time_scale: 1.0,
            alpha: 1.0,
            animation_start: 0.0,
            animation_end: animation.duration,
            animation_last: -1.0,
            next_animation_last: -1.0,
            track_last: -1.0,
            next_track_last: -1.0,
            mix_time: 0.0,
            mix_duration,
            mix_blend: MixBlend::Replace,
            interrupt_alpha: 1.0,
            total_alpha: 0.0,
            event_threshold: 0.0,
            mix_attachment_threshold: 0.0,
            alpha_attachment_threshold: 0.0,
            mix_draw_order_threshold: 0.0,
            previous: None,
            next: None,
            mixing_from: None,
            mixing_to: None,
            retired: false,
            animation,
        }
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn animation(&self) -> &Arc<Animation> {
        &self.animation
    }

    pub fn animation_index(&self) -> Option<usize> {
        self.animation_index
    }

    pub fn is_empty_animation(&self) -> bool {
        self.animation_index.is_none()
    }

    /// The entry this one was queued after. Cleared once this entry becomes current.
    pub fn previous(&self) -> Option<TrackEntryHandle> {
        self.previous
    }

    /// The entry queued to play after this one.
    pub fn next(&self) -> Option<TrackEntryHandle> {
        self.next
    }

    /// The entry being faded out while this one fades in.
    pub fn mixing_from(&self) -> Option<TrackEntryHandle> {
        self.mixing_from
    }

    /// The entry fading in while this one fades out.
    pub fn mixing_to(&self) -> Option<TrackEntryHandle> {
        self.mixing_to
    }

    pub fn interrupt_alpha(&self) -> f32 {
        self.interrupt_alpha
    }

    pub fn total_alpha(&self) -> f32 {
        self.total_alpha
    }

    pub fn animation_last(&self) -> f32 {
        self.animation_last
    }

    pub fn track_last(&self) -> f32 {
        self.track_last
    }

    /// Whether the entry has been applied at least once.
    pub fn was_applied(&self) -> bool {
        self.next_track_last >= 0.0
    }

    /// `true` once the entry ended or was dropped from its track; only retired entries can be
    /// disposed.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn is_complete(&self) -> bool {
        self.track_time >= self.animation_end - self.animation_start
    }

    pub fn animation_time(&self) -> f32 {
        if self.looped {
            let duration = self.animation_end - self.animation_start;
            if duration == 0.0 {
                return self.animation_start;
            }
            return self.track_time % duration + self.animation_start;
        }
        let animation_time = self.track_time + self.animation_start;
        if self.animation_end >= self.animation.duration {
            animation_time
        } else {
            animation_time.min(self.animation_end)
        }
    }

    /// Track time at which the current loop (or the whole animation) completes.
    pub fn track_complete(&self) -> f32 {
        let duration = self.animation_end - self.animation_start;
        if duration != 0.0 {
            if self.looped {
                return duration * (1.0 + (self.track_time / duration).trunc());
            }
            if self.track_time < duration {
                return duration;
            }
        }
        self.track_time
    }

    fn is_linked(&self) -> bool {
        self.previous.is_some()
            || self.next.is_some()
            || self.mixing_from.is_some()
            || self.mixing_to.is_some()
    }
}

impl TrackEntryHandle {
    fn with_entry_mut(&self, state: &mut AnimationState, f: impl FnOnce(&mut TrackEntry)) {
        if let Some(entry) = state.entry_mut(*self) {
            f(entry);
        }
    }

    pub fn set_track_end(&self, state: &mut AnimationState, track_end: f32) {
        self.with_entry_mut(state, |entry| entry.track_end = track_end);
    }

    pub fn set_delay(&self, state: &mut AnimationState, delay: f32) {
        self.with_entry_mut(state, |entry| entry.delay = delay);
    }

    pub fn set_time_scale(&self, state: &mut AnimationState, time_scale: f32) {
        self.with_entry_mut(state, |entry| entry.time_scale = time_scale);
    }

    pub fn set_mix_duration(&self, state: &mut AnimationState, mix_duration: f32) {
        self.with_entry_mut(state, |entry| entry.mix_duration = mix_duration);
    }

    pub fn set_mix_blend(&self, state: &mut AnimationState, mix_blend: MixBlend) {
        self.with_entry_mut(state, |entry| entry.mix_blend = mix_blend);
    }

    pub fn set_alpha(&self, state: &mut AnimationState, alpha: f32) {
        self.with_entry_mut(state, |entry| entry.alpha = alpha);
    }

    pub fn set_reverse(&self, state: &mut AnimationState, reverse: bool) {
        self.with_entry_mut(state, |entry| entry.reverse = reverse);
    }

    pub fn set_hold_previous(&self, state: &mut AnimationState, hold_previous: bool) {
        self.with_entry_mut(state, |entry| entry.hold_previous = hold_previous);
    }

    pub fn set_event_threshold(&self, state: &mut AnimationState, threshold: f32) {
        self.with_entry_mut(state, |entry| entry.event_threshold = threshold);
    }

    pub fn set_mix_attachment_threshold(&self, state: &mut AnimationState, threshold: f32) {
        self.with_entry_mut(state, |entry| entry.mix_attachment_threshold = threshold);
    }

    pub fn set_alpha_attachment_threshold(&self, state: &mut AnimationState, threshold: f32) {
        self.with_entry_mut(state, |entry| entry.alpha_attachment_threshold = threshold);
    }

    pub fn set_mix_draw_order_threshold(&self, state: &mut AnimationState, threshold: f32) {
        self.with_entry_mut(state, |entry| entry.mix_draw_order_threshold = threshold);
    }

    pub fn set_animation_start(&self, state: &mut AnimationState, animation_start: f32) {
        self.with_entry_mut(state, |entry| entry.animation_start = animation_start);
    }

    pub fn set_animation_end(&self, state: &mut AnimationState, animation_end: f32) {
        self.with_entry_mut(state, |entry| entry.animation_end = animation_end);
    }

    /// Sets the time events were last collected at, so the next apply only fires later events.
    pub fn set_animation_last(&self, state: &mut AnimationState, animation_last: f32) {
        self.with_entry_mut(state, |entry| {
            entry.animation_last = animation_last;
            entry.next_animation_last = animation_last;
        });
    }
}

#[derive(Clone, Debug)]
struct QueuedEvent {
    kind: EventType,
    entry: TrackEntryHandle,
    event: Option<Event>,
}

/// Tracks of animation entries, their queues and cross-fades.
///
/// Lifecycle and user events are queued while updating/applying and handed to a listener by
/// [`AnimationState::drain_events`].
#[derive(Debug)]
pub struct AnimationState {
    data: AnimationStateData,
    tracks: Vec<Option<TrackEntryHandle>>,
    entries: Vec<EntrySlot>,
    free_list: Vec<usize>,
    event_queue: VecDeque<QueuedEvent>,
    events_scratch: Vec<Event>,
    empty_animation: Arc<Animation>,
    time_scale: f32,
    manual_track_entry_disposal: bool,
}

impl AnimationState {
    pub fn new(data: AnimationStateData) -> Self {
        Self {
            data,
            tracks: Vec::new(),
            entries: Vec::new(),
            free_list: Vec::new(),
            event_queue: VecDeque::new(),
            events_scratch: Vec::new(),
            empty_animation: Arc::new(Animation::empty()),
            time_scale: 1.0,
            manual_track_entry_disposal: false,
        }
    }

    pub fn data(&self) -> &AnimationStateData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut AnimationStateData {
        &mut self.data
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale;
    }

    pub fn manual_track_entry_disposal(&self) -> bool {
        self.manual_track_entry_disposal
    }

    /// With manual disposal, entries survive their `Dispose` event until
    /// [`Self::dispose_track_entry`] is called. Otherwise they are freed as soon as the event is
    /// drained.
    pub fn set_manual_track_entry_disposal(&mut self, manual: bool) {
        self.manual_track_entry_disposal = manual;
    }

    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    pub fn current(&self, track_index: usize) -> Option<TrackEntryHandle> {
        self.tracks.get(track_index).copied().flatten()
    }

    pub fn entry(&self, handle: TrackEntryHandle) -> Option<&TrackEntry> {
        let slot = self.entries.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    pub fn entry_mut(&mut self, handle: TrackEntryHandle) -> Option<&mut TrackEntry> {
        let slot = self.entries.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Number of entries not yet disposed.
    pub fn live_entries(&self) -> usize {
        self.entries.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.event_queue.is_empty()
    }

    pub fn set_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
    ) -> Result<TrackEntryHandle, Error> {
        let (animation_index, animation) = self.find_animation(animation_name)?;
        Ok(self.set_animation_internal(track_index, Some(animation_index), animation, looped))
    }

    pub fn add_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryHandle, Error> {
        if !delay.is_finite() {
            return Err(Error::InvalidValue {
                message: "delay must be finite".to_string(),
            });
        }
        let (animation_index, animation) = self.find_animation(animation_name)?;
        Ok(self.add_animation_internal(track_index, Some(animation_index), animation, looped, delay))
    }

    /// Replaces the track's entries with the empty animation, fading the current pose out over
    /// `mix_duration`.
    pub fn set_empty_animation(
        &mut self,
        track_index: usize,
        mix_duration: f32,
    ) -> Result<TrackEntryHandle, Error> {
        validate_mix_duration(mix_duration)?;
        let empty = self.empty_animation.clone();
        let handle = self.set_animation_internal(track_index, None, empty, false);
        if let Some(entry) = self.entry_mut(handle) {
            entry.mix_duration = mix_duration;
            entry.track_end = mix_duration;
        }
        Ok(handle)
    }

    /// Queues the empty animation after the track's last entry.
    pub fn add_empty_animation(
        &mut self,
        track_index: usize,
        mix_duration: f32,
        delay: f32,
    ) -> Result<TrackEntryHandle, Error> {
        validate_mix_duration(mix_duration)?;
        if !delay.is_finite() {
            return Err(Error::InvalidValue {
                message: "delay must be finite".to_string(),
            });
        }
        let empty = self.empty_animation.clone();
        let handle = self.add_animation_internal(track_index, None, empty, false, delay);
        if let Some(entry) = self.entry_mut(handle) {
            if delay <= 0.0 {
                // End the empty mix when the previous entry would have completed.
                entry.delay = (entry.delay + entry.mix_duration - mix_duration).max(0.0);
            }
            entry.mix_duration = mix_duration;
            entry.track_end = mix_duration;
        }
        Ok(handle)
    }

    /// Fades every track out to the empty animation.
    pub fn set_empty_animations(&mut self, mix_duration: f32) -> Result<(), Error> {
        validate_mix_duration(mix_duration)?;
        for track_index in 0..self.tracks.len() {
            if self.current(track_index).is_some() {
                self.set_empty_animation(track_index, mix_duration)?;
            }
        }
        Ok(())
    }

    fn find_animation(&self, name: &str) -> Result<(usize, Arc<Animation>), Error> {
        self.data
            .skeleton_data
            .animation(name)
            .map(|(index, animation)| (index, animation.clone()))
            .ok_or_else(|| Error::UnknownAnimation {
                name: name.to_string(),
            })
    }

    fn new_entry(
        &mut self,
        track_index: usize,
        animation_index: Option<usize>,
        animation: Arc<Animation>,
        looped: bool,
        last: Option<TrackEntryHandle>,
    ) -> TrackEntryHandle {
        let mix_duration = last
            .and_then(|last| self.entry(last))
            .map(|last| self.data.mix_duration(last.animation_index, animation_index))
            .unwrap_or(0.0);
        self.alloc_entry(TrackEntry::new(
            track_index,
            animation_index,
            animation,
            looped,
            mix_duration,
        ))
    }

    fn set_animation_internal(
        &mut self,
        track_index: usize,
        animation_index: Option<usize>,
        animation: Arc<Animation>,
        looped: bool,
    ) -> TrackEntryHandle {
        self.ensure_track(track_index);
        let mut interrupt = true;
        let mut current = self.tracks[track_index];
        if let Some(current_handle) = current {
            let never_applied = self
                .entry(current_handle)
                .is_some_and(|entry| !entry.was_applied());
            if never_applied {
                // Don't mix from an entry that was never applied.
                let mixing_from = self.entry(current_handle).and_then(|e| e.mixing_from);
                self.tracks[track_index] = mixing_from;
                self.push_event(EventType::Interrupt, current_handle, None);
                self.push_end(current_handle);
                self.clear_next(current_handle);
                self.retire(current_handle);
                current = mixing_from;
                interrupt = false;
            } else {
                self.clear_next(current_handle);
            }
        }

        let handle = self.new_entry(track_index, animation_index, animation, looped, current);
        self.set_current(track_index, handle, interrupt);
        handle
    }

    fn add_animation_internal(
        &mut self,
        track_index: usize,
        animation_index: Option<usize>,
        animation: Arc<Animation>,
        looped: bool,
        delay: f32,
    ) -> TrackEntryHandle {
        self.ensure_track(track_index);
        let mut last = self.tracks[track_index];
        while let Some(next) = last.and_then(|handle| self.entry(handle)).and_then(|e| e.next) {
            last = Some(next);
        }

        let handle = self.new_entry(track_index, animation_index, animation, looped, last);
        let mut delay = delay;
        match last {
            None => {
                self.set_current(track_index, handle, true);
                delay = delay.max(0.0);
            }
            Some(last) => {
                let last_complete = self.entry(last).map(TrackEntry::track_complete).unwrap_or(0.0);
                if let Some(last_entry) = self.entry_mut(last) {
                    last_entry.next = Some(handle);
                }
                if let Some(entry) = self.entry_mut(handle) {
                    entry.previous = Some(last);
                    if delay <= 0.0 {
                        delay = (delay + last_complete - entry.mix_duration).max(0.0);
                    }
                }
            }
        }
        if let Some(entry) = self.entry_mut(handle) {
            entry.delay = delay;
        }
        handle
    }

    /// Makes `handle` the track's current entry, cross-fading from the previous current entry.
    fn set_current(&mut self, track_index: usize, handle: TrackEntryHandle, interrupt: bool) {
        let from = self.tracks[track_index];
        self.tracks[track_index] = Some(handle);
        if let Some(entry) = self.entry_mut(handle) {
            entry.previous = None;
        }

        if let Some(from) = from {
            if interrupt {
                self.push_event(EventType::Interrupt, from, None);
            }
            let interrupt_scale = self
                .entry(from)
                .filter(|from| from.mixing_from.is_some() && from.mix_duration > 0.0)
                .map(|from| (from.mix_time / from.mix_duration).min(1.0))
                .unwrap_or(1.0);
            if let Some(from_entry) = self.entry_mut(from) {
                from_entry.mixing_to = Some(handle);
                if from_entry.next == Some(handle) {
                    from_entry.next = None;
                }
            }
            if let Some(entry) = self.entry_mut(handle) {
                entry.mixing_from = Some(from);
                entry.mix_time = 0.0;
                entry.interrupt_alpha *= interrupt_scale;
            }
        }

        self.push_event(EventType::Start, handle, None);
    }

    /// Drops every entry queued after `handle`.
    fn clear_next(&mut self, handle: TrackEntryHandle) {
        let mut next = self.entry_mut(handle).and_then(|entry| entry.next.take());
        while let Some(queued) = next {
            next = self.entry(queued).and_then(|entry| entry.next);
            self.push_event(EventType::Dispose, queued, None);
            self.retire(queued);
        }
    }

    /// Ends the track: the current entry and everything it is mixing from or queued after it.
    pub fn clear_track(&mut self, track_index: usize) {
        let Some(current) = self.current(track_index) else {
            return;
        };
        self.push_end(current);
        self.clear_next(current);

        let mut from = self.entry(current).and_then(|entry| entry.mixing_from);
        self.retire(current);
        while let Some(from_handle) = from {
            from = self.entry(from_handle).and_then(|entry| entry.mixing_from);
            self.push_end(from_handle);
            self.retire(from_handle);
        }
        self.tracks[track_index] = None;
    }

    pub fn clear_tracks(&mut self) {
        for track_index in 0..self.tracks.len() {
            self.clear_track(track_index);
        }
        self.tracks.clear();
    }

    /// Advances every track by `delta` seconds (scaled by the state and entry time scales),
    /// promoting queued entries and finishing cross-fades.
    pub fn update(&mut self, delta: f32) {
        if !delta.is_finite() || delta < 0.0 {
            log::warn!("ignoring animation state update with delta {delta}");
            return;
        }
        let delta = delta * self.time_scale;

        for track_index in 0..self.tracks.len() {
            let Some(current) = self.tracks[track_index] else {
                continue;
            };
            let Some(entry) = self.entry_mut(current) else {
                self.tracks[track_index] = None;
                continue;
            };

            entry.animation_last = entry.next_animation_last;
            entry.track_last = entry.next_track_last;

            let mut current_delta = delta * entry.time_scale;
            if entry.delay > 0.0 {
                entry.delay -= current_delta;
                if entry.delay > 0.0 {
                    continue;
                }
                current_delta = -entry.delay;
                entry.delay = 0.0;
            }

            let current_time_scale = entry.time_scale;
            let track_last = entry.track_last;
            let track_end = entry.track_end;
            let has_mixing_from = entry.mixing_from.is_some();

            if let Some(next) = entry.next {
                let next_delay = self.entry(next).map(|e| e.delay).unwrap_or(0.0);
                let next_time = track_last - next_delay;
                if next_time >= 0.0 {
                    if let Some(next_entry) = self.entry_mut(next) {
                        next_entry.delay = 0.0;
                        // Carry the time past the switch point into the next entry.
                        if current_time_scale != 0.0 {
                            next_entry.track_time +=
                                (next_time / current_time_scale + delta) * next_entry.time_scale;
                        }
                    }
                    if let Some(entry) = self.entry_mut(current) {
                        entry.track_time += current_delta;
                    }
                    self.set_current(track_index, next, true);

                    let mut mixing = Some(next);
                    while let Some(handle) = mixing {
                        let Some(entry) = self.entry_mut(handle) else {
                            break;
                        };
                        if entry.mixing_from.is_none() {
                            break;
                        }
                        entry.mix_time += delta;
                        mixing = entry.mixing_from;
                    }
                    continue;
                }
            } else if track_last >= track_end && !has_mixing_from {
                self.tracks[track_index] = None;
                self.push_end(current);
                self.clear_next(current);
                self.retire(current);
                continue;
            }

            if has_mixing_from && self.update_mixing_from(current, delta) {
                // Every entry in the mix chain finished.
                let mut from = self.entry_mut(current).and_then(|entry| entry.mixing_from.take());
                while let Some(from_handle) = from {
                    from = self.entry(from_handle).and_then(|entry| entry.mixing_from);
                    self.push_end(from_handle);
                    self.retire(from_handle);
                }
            }

            if let Some(entry) = self.entry_mut(current) {
                entry.track_time += current_delta;
            }
        }
    }

    /// Returns `true` when every entry mixing into `to` has finished.
    fn update_mixing_from(&mut self, to: TrackEntryHandle, delta: f32) -> bool {
        let Some(from) = self.entry(to).and_then(|entry| entry.mixing_from) else {
            return true;
        };

        let finished = self.update_mixing_from(from, delta);

        let Some(from_entry) = self.entry_mut(from) else {
            return finished;
        };
        from_entry.animation_last = from_entry.next_animation_last;
        from_entry.track_last = from_entry.next_track_last;
        let from_total_alpha = from_entry.total_alpha;
        let from_interrupt_alpha = from_entry.interrupt_alpha;
        let from_mixing_from = from_entry.mixing_from;

        let Some(to_entry) = self.entry(to) else {
            return finished;
        };
        if to_entry.was_applied() && to_entry.mix_time >= to_entry.mix_duration {
            // Mixing is complete for all entries before `from`, or the mix is instantaneous.
            if from_total_alpha == 0.0 || to_entry.mix_duration == 0.0 {
                if let Some(to_entry) = self.entry_mut(to) {
                    to_entry.mixing_from = from_mixing_from;
                    to_entry.interrupt_alpha = from_interrupt_alpha;
                }
                if let Some(older) = from_mixing_from.and_then(|h| self.entry_mut(h)) {
                    older.mixing_to = Some(to);
                }
                if let Some(from_entry) = self.entry_mut(from) {
                    from_entry.mixing_from = None;
                    from_entry.mixing_to = None;
                }
                self.push_end(from);
                self.retire(from);
            }
            return finished;
        }

        if let Some(from_entry) = self.entry_mut(from) {
            from_entry.track_time += delta * from_entry.time_scale;
        }
        if let Some(to_entry) = self.entry_mut(to) {
            to_entry.mix_time += delta;
        }
        false
    }

    /// Applies every track to `skeleton` through `applier` and queues the events and completions
    /// crossed since the last apply. Returns `true` if any track was applied.
    pub fn apply<A: AnimationApplier + ?Sized>(
        &mut self,
        skeleton: &mut Skeleton,
        applier: &mut A,
    ) -> bool {
        let mut applied = false;
        for track_index in 0..self.tracks.len() {
            let Some(current) = self.tracks[track_index] else {
                continue;
            };
            let Some(entry) = self.entry(current) else {
                continue;
            };
            if entry.delay > 0.0 {
                continue;
            }
            applied = true;

            let blend = if track_index == 0 {
                MixBlend::First
            } else {
                entry.mix_blend
            };
            let mut alpha = entry.alpha;
            if entry.mixing_from.is_some() {
                alpha *= self.apply_mixing_from(current, skeleton, blend, applier);
            } else if entry.track_time >= entry.track_end && entry.next.is_none() {
                alpha = 0.0;
            }

            let Some(entry) = self.entry(current) else {
                continue;
            };
            let animation = entry.animation.clone();
            let animation_last = entry.animation_last;
            let animation_time = entry.animation_time();
            let reverse = entry.reverse;
            let looped = entry.looped;
            let attachments = alpha >= entry.alpha_attachment_threshold;
            let apply_time = if reverse {
                animation.duration - animation_time
            } else {
                animation_time
            };

            applier.apply_animation(
                skeleton,
                &AppliedAnimation {
                    entry: current,
                    track_index,
                    animation: &animation,
                    last_time: animation_last,
                    time: apply_time,
                    looped,
                    alpha,
                    blend,
                    direction: MixDirection::In,
                    attachments,
                    draw_order: true,
                },
            );

            // Playing in reverse never fires user events.
            self.events_scratch.clear();
            if !reverse {
                collect_events(
                    &animation,
                    animation_last,
                    apply_time,
                    looped,
                    &mut self.events_scratch,
                );
            }
            self.queue_events(current, animation_time);

            if let Some(entry) = self.entry_mut(current) {
                entry.next_animation_last = animation_time;
                entry.next_track_last = entry.track_time;
            }
        }
        applied
    }

    /// Applies the entry `to` is fading out from (recursively) and returns the mix percentage.
    fn apply_mixing_from<A: AnimationApplier + ?Sized>(
        &mut self,
        to: TrackEntryHandle,
        skeleton: &mut Skeleton,
        blend: MixBlend,
        applier: &mut A,
    ) -> f32 {
        let Some(from) = self.entry(to).and_then(|entry| entry.mixing_from) else {
            return 1.0;
        };
        if self.entry(from).is_some_and(|entry| entry.mixing_from.is_some()) {
            self.apply_mixing_from(from, skeleton, blend, applier);
        }

        let Some(to_entry) = self.entry(to) else {
            return 1.0;
        };
        let mix_duration = to_entry.mix_duration;
        let interrupt_alpha = to_entry.interrupt_alpha;
        let mut blend = blend;
        let mix = if mix_duration == 0.0 {
            if blend == MixBlend::First {
                blend = MixBlend::Setup;
            }
            1.0
        } else {
            let from_blend = self.entry(from).map(|e| e.mix_blend).unwrap_or(blend);
            if blend != MixBlend::First {
                blend = from_blend;
            }
            (to_entry.mix_time / mix_duration).min(1.0)
        };

        let Some(from_entry) = self.entry(from) else {
            return mix;
        };
        let animation = from_entry.animation.clone();
        let animation_last = from_entry.animation_last;
        let animation_time = from_entry.animation_time();
        let looped = from_entry.looped;
        let reverse = from_entry.reverse;
        let attachments = mix < from_entry.mix_attachment_threshold;
        let draw_order = mix < from_entry.mix_draw_order_threshold;
        let fire_events = !reverse && mix < from_entry.event_threshold;
        let alpha_mix = from_entry.alpha * interrupt_alpha * (1.0 - mix);
        let apply_time = if reverse {
            animation.duration - animation_time
        } else {
            animation_time
        };

        applier.apply_animation(
            skeleton,
            &AppliedAnimation {
                entry: from,
                track_index: from_entry.track_index,
                animation: &animation,
                last_time: animation_last,
                time: apply_time,
                looped,
                alpha: alpha_mix,
                blend,
                direction: MixDirection::Out,
                attachments,
                draw_order,
            },
        );
        if let Some(from_entry) = self.entry_mut(from) {
            from_entry.total_alpha = alpha_mix;
        }

        self.events_scratch.clear();
        if mix_duration > 0.0 {
            if fire_events {
                collect_events(
                    &animation,
                    animation_last,
                    apply_time,
                    looped,
                    &mut self.events_scratch,
                );
            }
            self.queue_events(from, animation_time);
        }

        if let Some(from_entry) = self.entry_mut(from) {
            from_entry.next_animation_last = animation_time;
            from_entry.next_track_last = from_entry.track_time;
        }
        mix
    }

    /// Queues the collected user events around the entry's `Complete` event: events before the
    /// loop point, then `Complete`, then the events after it.
    fn queue_events(&mut self, handle: TrackEntryHandle, animation_time: f32) {
        let Some(entry) = self.entry(handle) else {
            return;
        };
        let animation_start = entry.animation_start;
        let animation_end = entry.animation_end;
        let duration = animation_end - animation_start;
        let track_last_wrapped = entry.track_last % duration;

        let complete = if entry.looped {
            if duration == 0.0 {
                true
            } else {
                let cycles = (entry.track_time / duration) as i32;
                cycles > 0 && cycles > (entry.track_last / duration) as i32
            }
        } else {
            animation_time >= animation_end && entry.animation_last < animation_end
        };

        let events = std::mem::take(&mut self.events_scratch);
        let mut split = events.len();
        for (i, event) in events.iter().enumerate() {
            if event.time < track_last_wrapped {
                split = i;
                break;
            }
            // Events past the animation end are discarded.
            if event.time > animation_end {
                continue;
            }
            self.push_event(EventType::Event, handle, Some(event.clone()));
        }
        if complete {
            self.push_event(EventType::Complete, handle, None);
        }
        for event in &events[split..] {
            if event.time < animation_start {
                continue;
            }
            self.push_event(EventType::Event, handle, Some(event.clone()));
        }
        self.events_scratch = events;
    }

    /// Delivers every queued event to `listener`, in firing order.
    ///
    /// Without manual disposal, an entry is freed right after its `Dispose` event is delivered.
    pub fn drain_events<L: AnimationStateListener + ?Sized>(&mut self, listener: &mut L) {
        while let Some(queued) = self.event_queue.pop_front() {
            listener.on_event(queued.kind, queued.entry, queued.event.as_ref());
            if queued.kind == EventType::Dispose && !self.manual_track_entry_disposal {
                self.free_entry(queued.entry);
            }
        }
    }

    /// Frees a retired entry.
    ///
    /// Fails with [`Error::TrackEntryInUse`] while the entry is still a track's current entry,
    /// queued, or part of a cross-fade, and with [`Error::StaleTrackEntry`] if it was already
    /// disposed.
    pub fn dispose_track_entry(&mut self, handle: TrackEntryHandle) -> Result<(), Error> {
        let Some(entry) = self.entry(handle) else {
            return Err(Error::StaleTrackEntry);
        };
        let track_index = entry.track_index;
        if entry.is_linked() || self.current(track_index) == Some(handle) {
            return Err(Error::TrackEntryInUse { track_index });
        }
        self.free_entry(handle);
        Ok(())
    }

    /// Frees every retired entry still alive. Returns how many were freed.
    pub fn dispose_retired_entries(&mut self) -> usize {
        let retired = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let entry = slot.entry.as_ref()?;
                entry.retired.then_some(TrackEntryHandle {
                    index,
                    generation: slot.generation,
                })
            })
            .collect::<Vec<_>>();
        let count = retired.len();
        for handle in retired {
            self.free_entry(handle);
        }
        count
    }

    fn ensure_track(&mut self, track_index: usize) {
        if track_index >= self.tracks.len() {
            self.tracks.resize(track_index + 1, None);
        }
    }

    fn alloc_entry(&mut self, entry: TrackEntry) -> TrackEntryHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.entries[index];
            slot.entry = Some(entry);
            TrackEntryHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.entries.len();
            self.entries.push(EntrySlot {
                generation: 0,
                entry: Some(entry),
            });
            TrackEntryHandle {
                index,
                generation: 0,
            }
        }
    }

    fn free_entry(&mut self, handle: TrackEntryHandle) {
        let Some(slot) = self.entries.get_mut(handle.index) else {
            return;
        };
        if slot.generation != handle.generation || slot.entry.is_none() {
            return;
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        log::debug!("disposed track entry {}", handle.index);
    }

    /// Marks an entry as no longer part of any track and severs its links in both directions.
    fn retire(&mut self, handle: TrackEntryHandle) {
        let Some(entry) = self.entry_mut(handle) else {
            return;
        };
        entry.retired = true;
        let previous = entry.previous.take();
        let next = entry.next.take();
        let mixing_from = entry.mixing_from.take();
        let mixing_to = entry.mixing_to.take();

        if let Some(other) = previous.and_then(|h| self.entry_mut(h)) {
            if other.next == Some(handle) {
                other.next = None;
            }
        }
        if let Some(other) = next.and_then(|h| self.entry_mut(h)) {
            if other.previous == Some(handle) {
                other.previous = None;
            }
        }
        if let Some(other) = mixing_from.and_then(|h| self.entry_mut(h)) {
            if other.mixing_to == Some(handle) {
                other.mixing_to = None;
            }
        }
        if let Some(other) = mixing_to.and_then(|h| self.entry_mut(h)) {
            if other.mixing_from == Some(handle) {
                other.mixing_from = None;
            }
        }
        log::debug!("retired track entry {}", handle.index);
    }

    fn push_event(&mut self, kind: EventType, entry: TrackEntryHandle, event: Option<Event>) {
        self.event_queue.push_back(QueuedEvent { kind, entry, event });
    }

    /// `End` is always followed by `Dispose`.
    fn push_end(&mut self, entry: TrackEntryHandle) {
        self.push_event(EventType::End, entry, None);
        self.push_event(EventType::Dispose, entry, None);
    }
}

fn validate_mix_duration(mix_duration: f32) -> Result<(), Error> {
    if !mix_duration.is_finite() || mix_duration < 0.0 {
        return Err(Error::InvalidValue {
            message: "mix duration must be finite and >= 0".to_string(),
        });
    }
    Ok(())
}

/// Collects the animation's events keyed in `(last_time, time]`, wrapping around the loop point
/// for looping animations.
pub(crate) fn collect_events(
    animation: &Animation,
    last_time: f32,
    time: f32,
    looped: bool,
    out: &mut Vec<Event>,
) {
    let events = &animation.events;
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return;
    };

    let mut last_time = last_time;
    let mut time = time;
    if looped && animation.duration != 0.0 {
        time %= animation.duration;
        if last_time > 0.0 {
            last_time %= animation.duration;
        }
    }

    if last_time > time {
        // Wrapped: fire what is left of the previous loop first.
        out.extend(events.iter().filter(|e| e.time > last_time).cloned());
        last_time = -1.0;
    } else if last_time >= last.time {
        return;
    }
    if time < first.time {
        return;
    }
    out.extend(
        events
            .iter()
            .filter(|e| e.time > last_time && e.time <= time)
            .cloned(),
    );
}
