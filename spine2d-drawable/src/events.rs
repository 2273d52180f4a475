use crate::{AnimationStateListener, Event, EventType, TrackEntryHandle};

/// One event delivered by the animation state.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferedEvent {
    pub kind: EventType,
    pub entry: TrackEntryHandle,
    /// Set for [`EventType::Event`] only.
    pub event: Option<Event>,
}

/// Ordered record of the events raised during an update.
///
/// Events are kept in firing order; lifecycle and user events of different tracks interleave.
/// The buffer only grows until [`EventBuffer::reset`] is called.
#[derive(Clone, Debug, Default)]
pub struct EventBuffer {
    events: Vec<BufferedEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: EventType, entry: TrackEntryHandle, event: Option<&Event>) {
        self.events.push(BufferedEvent {
            kind,
            entry,
            event: event.cloned(),
        });
    }

    pub fn reset(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BufferedEvent> {
        self.events.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BufferedEvent> {
        self.events.iter()
    }

    /// Host-facing count. Saturates at `i32::MAX`.
    pub fn count(&self) -> i32 {
        i32::try_from(self.events.len()).unwrap_or(i32::MAX)
    }

    /// Event type at `index`, or [`EventType::Dispose`] when `index` is out of range.
    pub fn event_type_at(&self, index: i32) -> EventType {
        self.at(index)
            .map(|buffered| buffered.kind)
            .unwrap_or(EventType::Dispose)
    }

    pub fn track_entry_at(&self, index: i32) -> Option<TrackEntryHandle> {
        self.at(index).map(|buffered| buffered.entry)
    }

    /// User event at `index`. `None` for lifecycle events and out-of-range indices.
    pub fn event_at(&self, index: i32) -> Option<&Event> {
        self.at(index).and_then(|buffered| buffered.event.as_ref())
    }

    fn at(&self, index: i32) -> Option<&BufferedEvent> {
        let index = usize::try_from(index).ok()?;
        self.events.get(index)
    }
}

impl AnimationStateListener for EventBuffer {
    fn on_event(&mut self, kind: EventType, entry: TrackEntryHandle, event: Option<&Event>) {
        self.push(kind, entry, event);
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = &'a BufferedEvent;
    type IntoIter = std::slice::Iter<'a, BufferedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
