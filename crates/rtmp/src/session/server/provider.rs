//! Message stream id allocation.

use std::collections::HashSet;

/// Allocates the message stream ids handed out by createStream.
pub trait StreamIdProvider: Send {
    /// Allocates the next stream id.
    fn create(&mut self) -> u32;

    /// Releases a stream id after deleteStream.
    fn delete(&mut self, stream_id: u32);

    /// Returns true while the stream id is allocated.
    fn has(&self, stream_id: u32) -> bool;
}

/// The default provider: hands out 3, 4, 5, ... and never the reserved
/// ids 0 (control) and 2.
#[derive(Debug)]
pub struct SequentialStreamIdProvider {
    next: u32,
    alive: HashSet<u32>,
}

impl Default for SequentialStreamIdProvider {
    fn default() -> Self {
        Self {
            next: 3,
            alive: HashSet::new(),
        }
    }
}

impl StreamIdProvider for SequentialStreamIdProvider {
    fn create(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        self.alive.insert(id);
        id
    }

    fn delete(&mut self, stream_id: u32) {
        self.alive.remove(&stream_id);
    }

    fn has(&self, stream_id: u32) -> bool {
        self.alive.contains(&stream_id)
    }
}
