use std::collections::VecDeque;

use crate::scene_controller::ModelHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelEventPayload {
    pub model: ModelHandle,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionEventPayload {
    /// `None` for the camera and light motions.
    pub model: Option<ModelHandle>,
    pub slot: String,
    pub frame_index: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ModelAdded(ModelEventPayload),
    ModelDeleted(ModelEventPayload),
    MotionAdded(MotionEventPayload),
    MotionChanged(MotionEventPayload),
    MotionDeleted(MotionEventPayload),
    MotionConfigured(MotionEventPayload),
    /// A player ran past its last frame in `once` mode and was detached.
    MotionFinished(MotionEventPayload),
    CameraMotionSet(MotionEventPayload),
    LightMotionSet(MotionEventPayload),
    PhysicsReset,
    /// Elapsed time beyond `max_sub_steps` was dropped.
    SubStepsDropped { requested: u32, performed: u32 },
}

pub trait EventPublisher {
    fn publish(&mut self, event: Event);
}

/// Events queued during mutations and ticks until the host drains them.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}

impl EventPublisher for EventQueue {
    fn publish(&mut self, event: Event) {
        self.events.push_back(event);
    }
}

#[test]
fn test_queue_drains_in_order() {
    let mut queue = EventQueue::new();
    queue.publish(Event::PhysicsReset);
    queue.publish(Event::ModelAdded(ModelEventPayload {
        model: 1,
        name: "miku".to_owned(),
    }));
    assert_eq!(2, queue.len());
    let events = queue.drain();
    assert_eq!(Event::PhysicsReset, events[0]);
    assert!(queue.is_empty());
}
