//! Retain-last publication.

use crate::outputs::{
    PoseSink, PoseStamped, StampedImage, TransformSink, TransformStamped, VisualizationSink,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

#[derive(Debug)]
struct LatchState<T> {
    last: Option<T>,
    subscribers: Vec<Sender<T>>,
}

/// Holds the last published value and replays it to every new subscriber.
///
/// Subscribers whose receiver was dropped are pruned on the next publish.
#[derive(Debug)]
pub struct Latched<T> {
    state: Mutex<LatchState<T>>,
}

impl<T> Default for Latched<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(LatchState {
                last: None,
                subscribers: Vec::new(),
            }),
        }
    }
}

impl<T: Clone> Latched<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, value: T) {
        let mut state = self.state.lock();
        state
            .subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
        state.last = Some(value);
    }

    /// New receiver, primed with the latched value if there is one.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = unbounded();
        let mut state = self.state.lock();
        if let Some(last) = &state.last {
            // The receiver is alive, so this cannot fail.
            let _ = tx.send(last.clone());
        }
        state.subscribers.push(tx);
        rx
    }

    pub fn latest(&self) -> Option<T> {
        self.state.lock().last.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }
}

impl PoseSink for Latched<PoseStamped> {
    fn publish_pose(&self, pose: &PoseStamped) {
        self.publish(pose.clone());
    }
}

impl TransformSink for Latched<TransformStamped> {
    fn publish_transform(&self, transform: &TransformStamped) {
        self.publish(transform.clone());
    }
}

impl VisualizationSink for Latched<StampedImage> {
    fn publish_visualization(&self, image: &StampedImage) {
        self.publish(image.clone());
    }
}
