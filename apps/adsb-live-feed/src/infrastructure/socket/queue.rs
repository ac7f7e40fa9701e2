//! Outbound Queue
//!
//! Holds frames sent while the transport is not connected. The queue is
//! drained front to back when the channel opens.

use std::collections::VecDeque;

use super::codec::OutboundFrame;

/// FIFO of frames waiting for an open channel.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: VecDeque<OutboundFrame>,
}

impl OutboundQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame at the back.
    pub fn push(&mut self, frame: OutboundFrame) {
        self.frames.push_back(frame);
    }

    /// Take the oldest frame.
    pub fn pop(&mut self) -> Option<OutboundFrame> {
        self.frames.pop_front()
    }

    /// Number of pending frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Take every pending frame in send order, leaving the queue empty.
    pub fn take_all(&mut self) -> Vec<OutboundFrame> {
        self.frames.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_queue() {
        let mut queue = OutboundQueue::new();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn take_all_empties_queue() {
        let mut queue = OutboundQueue::new();
        queue.push("a".into());
        queue.push("b".into());

        let frames = queue.take_all();

        assert_eq!(frames, vec![OutboundFrame::from("a"), OutboundFrame::from("b")]);
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn frames_leave_in_push_order(texts in proptest::collection::vec(".*", 0..64)) {
            let mut queue = OutboundQueue::new();
            for text in &texts {
                queue.push(OutboundFrame::Text(text.clone()));
            }
            prop_assert_eq!(queue.len(), texts.len());

            let mut drained = Vec::new();
            while let Some(OutboundFrame::Text(text)) = queue.pop() {
                drained.push(text);
            }

            prop_assert_eq!(drained, texts);
            prop_assert!(queue.is_empty());
        }

        #[test]
        fn interleaved_push_pop_preserves_order(ops in proptest::collection::vec(any::<bool>(), 0..128)) {
            let mut queue = OutboundQueue::new();
            let mut pushed = 0_u32;
            let mut expected_next = 0_u32;

            for push in ops {
                if push {
                    queue.push(OutboundFrame::Text(pushed.to_string()));
                    pushed += 1;
                } else if let Some(OutboundFrame::Text(text)) = queue.pop() {
                    prop_assert_eq!(text, expected_next.to_string());
                    expected_next += 1;
                }
            }

            prop_assert_eq!(queue.len() as u32, pushed - expected_next);
        }
    }
}
