use std::cmp::Ordering;
use std::collections::BinaryHeap;

use sidearm::{Message, WireError};

#[derive(Debug)]
struct InFlight {
    release_time: f32,
    order: u64,
    bytes: Vec<u8>,
}

impl PartialEq for InFlight {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for InFlight {}

impl PartialOrd for InFlight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InFlight {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .release_time
            .total_cmp(&self.release_time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStats {
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub bytes_sent: u64,
    pub in_flight: usize,
}

/// One direction of the simulated wire. Messages cross as encoded bytes
/// and come out in send order once their delay has passed.
#[derive(Debug)]
pub struct LatencyLink {
    latency: f32,
    jitter: f32,
    queue: BinaryHeap<InFlight>,
    next_order: u64,
    last_release: f32,
    stats: LinkStats,
}

impl LatencyLink {
    pub fn new(latency_ms: u32, jitter_ms: u32) -> Self {
        Self {
            latency: latency_ms as f32 / 1000.0,
            jitter: jitter_ms as f32 / 1000.0,
            queue: BinaryHeap::new(),
            next_order: 0,
            last_release: 0.0,
            stats: LinkStats::default(),
        }
    }

    pub fn send(&mut self, now: f32, message: &Message, rng: &mut fastrand::Rng) -> Result<(), WireError> {
        let bytes = message.encode()?;
        let jitter = if self.jitter > 0.0 {
            rng.f32() * self.jitter
        } else {
            0.0
        };
        // Jitter never reorders the stream.
        let release_time = (now + self.latency + jitter).max(self.last_release);
        self.last_release = release_time;

        self.stats.messages_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;
        self.queue.push(InFlight {
            release_time,
            order: self.next_order,
            bytes,
        });
        self.next_order += 1;
        Ok(())
    }

    /// Decodes everything due by `now`.
    pub fn receive(&mut self, now: f32) -> Vec<Result<Message, WireError>> {
        let mut messages = Vec::new();
        while self.queue.peek().is_some_and(|m| m.release_time <= now) {
            let Some(in_flight) = self.queue.pop() else {
                break;
            };
            self.stats.messages_delivered += 1;
            messages.push(Message::decode(&in_flight.bytes));
        }
        messages
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.last_release = 0.0;
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            in_flight: self.queue.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidearm::{Envelope, RemoteCall};

    fn call(sequence: u32) -> Message {
        Message::Call(Envelope::new(7, RemoteCall::HandleFiring { sequence }))
    }

    #[test]
    fn test_delivers_after_latency() {
        let mut rng = fastrand::Rng::with_seed(1);
        let mut link = LatencyLink::new(100, 0);
        link.send(0.0, &call(1), &mut rng).unwrap();

        assert!(link.receive(0.05).is_empty());
        let delivered = link.receive(0.1);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].as_ref().unwrap(), &call(1));
        assert_eq!(link.stats().in_flight, 0);
    }

    #[test]
    fn test_jitter_keeps_send_order() {
        let mut rng = fastrand::Rng::with_seed(9);
        let mut link = LatencyLink::new(20, 80);
        for sequence in 0..20 {
            link.send(sequence as f32 * 0.001, &call(sequence), &mut rng).unwrap();
        }

        let order: Vec<_> = link
            .receive(1.0)
            .into_iter()
            .map(|m| match m.unwrap() {
                Message::Call(Envelope {
                    call: RemoteCall::HandleFiring { sequence },
                    ..
                }) => sequence,
                other => panic!("unexpected message {:?}", other),
            })
            .collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
        assert!(link.stats().bytes_sent > 0);
    }
}
