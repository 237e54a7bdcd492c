//! Ordered, thread-safe buffer of pending outbound messages.
//!
//! The queue is the only structure shared with producer threads outside the
//! sender's workers, so every access goes through one mutex held for O(1)
//! work.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// One line of text waiting for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    payload: String,
}

impl OutboundMessage {
    /// Wrap `text`, stripping a single trailing line terminator.
    pub fn new(text: impl Into<String>) -> Self {
        let mut payload = text.into();
        if payload.ends_with('\n') {
            payload.pop();
            if payload.ends_with('\r') {
                payload.pop();
            }
        }
        Self { payload }
    }

    /// The empty liveness message.
    pub fn heartbeat() -> Self {
        Self {
            payload: String::new(),
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Bytes written to the wire: the payload and one `\n`.
    pub fn frame(&self) -> Vec<u8> {
        let mut framed = Vec::with_capacity(self.payload.len() + 1);
        framed.extend_from_slice(self.payload.as_bytes());
        framed.push(b'\n');
        framed
    }
}

/// Why a push was refused; carries the rejected message.
#[derive(Debug, PartialEq, Eq)]
pub enum PushError {
    /// The queue is at capacity.
    Full(OutboundMessage),
    /// The queue was closed by teardown.
    Closed(OutboundMessage),
}

#[derive(Debug)]
struct Items {
    messages: VecDeque<OutboundMessage>,
    closed: bool,
}

/// FIFO buffer shared between producers and the writer.
#[derive(Debug)]
pub struct OutboundQueue {
    items: Mutex<Items>,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Items {
                messages: VecDeque::new(),
                closed: false,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `message` at the tail.
    pub fn push(&self, message: OutboundMessage) -> Result<(), PushError> {
        let mut items = self.items.lock();
        if items.closed {
            return Err(PushError::Closed(message));
        }
        if items.messages.len() >= self.capacity {
            return Err(PushError::Full(message));
        }
        items.messages.push_back(message);
        Ok(())
    }

    /// Remove the head message, if any.
    pub fn pop(&self) -> Option<OutboundMessage> {
        self.items.lock().messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().messages.is_empty()
    }

    /// Discard everything still queued, returning how many messages were lost.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.messages.len();
        items.messages.clear();
        dropped
    }

    /// Clear the queue and refuse every later push. Returns the number of
    /// messages discarded.
    pub fn close(&self) -> usize {
        let mut items = self.items.lock();
        items.closed = true;
        let dropped = items.messages.len();
        items.messages.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("hello", "hello")]
    #[case("hello\n", "hello")]
    #[case("hello\r\n", "hello")]
    #[case("a\nb\n", "a\nb")]
    #[case("\n", "")]
    fn strips_one_trailing_terminator(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(OutboundMessage::new(input).payload(), expected);
    }

    #[rstest]
    fn frame_ends_with_single_newline() {
        assert_eq!(OutboundMessage::new("VM Started\n").frame(), b"VM Started\n");
        assert_eq!(OutboundMessage::heartbeat().frame(), b"\n");
        assert!(OutboundMessage::new("\n").is_heartbeat());
    }

    #[rstest]
    fn pop_on_empty_returns_none() {
        let queue = OutboundQueue::new(4);
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[rstest]
    fn rejects_when_full_and_keeps_existing() {
        let queue = OutboundQueue::new(2);
        queue.push(OutboundMessage::new("a")).expect("room for a");
        queue.push(OutboundMessage::new("b")).expect("room for b");
        let rejected = queue
            .push(OutboundMessage::new("c"))
            .expect_err("queue is full");
        assert_eq!(rejected, PushError::Full(OutboundMessage::new("c")));
        assert_eq!(queue.pop().map(|m| m.payload().to_owned()), Some("a".into()));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.clear(), 1);
    }

    #[rstest]
    fn close_discards_and_rejects_later_pushes() {
        let queue = OutboundQueue::new(4);
        queue.push(OutboundMessage::new("a")).expect("room for a");
        assert_eq!(queue.close(), 1);
        assert_eq!(
            queue.push(OutboundMessage::new("b")),
            Err(PushError::Closed(OutboundMessage::new("b")))
        );
        assert!(queue.is_empty());
        assert_eq!(queue.close(), 0);
    }

    proptest! {
        #[test]
        fn preserves_enqueue_order(messages in proptest::collection::vec("[a-z]{0,8}", 0..64)) {
            let queue = OutboundQueue::new(64);
            for m in &messages {
                queue.push(OutboundMessage::new(m.clone())).expect("capacity suffices");
            }
            let drained: Vec<String> =
                std::iter::from_fn(|| queue.pop().map(|m| m.payload().to_owned())).collect();
            prop_assert_eq!(drained, messages);
        }
    }
}
