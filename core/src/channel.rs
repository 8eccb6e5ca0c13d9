//! `Channel`: the capability interface every process communicates over.
//! Concrete transports (shared memory, sockets) are out of scope; the core
//! only assumes a reliable, message-oriented, bidirectional channel that
//! never blocks on `try_recv`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::protocol::TransportEnvelope;

/// One end of a bidirectional, message-oriented link. `try_recv` is
/// non-blocking by contract: every tick loop in this crate polls it rather
/// than waiting, so a suspension point is always an explicit channel I/O
/// call, never a hidden one.
pub trait Channel {
    /// Enqueue `envelope` for the peer. Implementations MUST preserve FIFO
    /// order per channel.
    fn send(&mut self, envelope: TransportEnvelope);

    /// Pop the next envelope if one has arrived, without blocking.
    fn try_recv(&mut self) -> Option<TransportEnvelope>;

    /// Whether the peer has gone away. A closed channel never yields
    /// further envelopes from `try_recv`.
    fn is_closed(&self) -> bool;
}

struct Shared {
    queue: VecDeque<TransportEnvelope>,
    closed: bool,
}

impl Shared {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            closed: false,
        }
    }
}

/// One end of an in-process, unbounded FIFO channel pair. Dropping an end
/// closes it from the other end's point of view — there is no real
/// transport in this crate, only the pairing [`MemoryChannel::pair`]
/// builds for tests and for wiring a self-contained demo together.
pub struct MemoryChannel {
    outbox: Rc<RefCell<Shared>>,
    inbox: Rc<RefCell<Shared>>,
}

impl MemoryChannel {
    /// Build two ends of one duplex channel: `a`'s sends land in `b`'s
    /// `try_recv`, and vice versa.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Rc::new(RefCell::new(Shared::new()));
        let b_to_a = Rc::new(RefCell::new(Shared::new()));
        let a = Self {
            outbox: a_to_b.clone(),
            inbox: b_to_a.clone(),
        };
        let b = Self {
            outbox: b_to_a,
            inbox: a_to_b,
        };
        (a, b)
    }

    /// Simulate this end hanging up: the peer will observe `is_closed` and
    /// stop receiving further envelopes from it.
    pub fn close(&mut self) {
        self.outbox.borrow_mut().closed = true;
    }
}

impl Channel for MemoryChannel {
    fn send(&mut self, envelope: TransportEnvelope) {
        self.outbox.borrow_mut().queue.push_back(envelope);
    }

    fn try_recv(&mut self) -> Option<TransportEnvelope> {
        self.inbox.borrow_mut().queue.pop_front()
    }

    fn is_closed(&self) -> bool {
        self.inbox.borrow().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TransportOp;

    #[test]
    fn fifo_order_is_preserved_across_the_pair() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.send(TransportEnvelope::ok(TransportOp::Ok, None));
        a.send(TransportEnvelope::error(TransportOp::Error));
        assert_eq!(b.try_recv().unwrap().op, TransportOp::Ok);
        assert_eq!(b.try_recv().unwrap().op, TransportOp::Error);
        assert!(b.try_recv().is_none());
    }

    #[test]
    fn closing_one_end_is_observed_by_the_other() {
        let (mut a, b) = MemoryChannel::pair();
        assert!(!b.is_closed());
        a.close();
        assert!(b.is_closed());
    }
}
