use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// How long queued-but-undrained MP3 bytes are retained before being
/// dropped, per spec §4.6 ("unbounded (but trimmed to last N seconds)").
const DEFAULT_RETENTION: Duration = Duration::from_secs(10);

struct Chunk {
    bytes: Vec<u8>,
    pushed_at: Instant,
}

/// Per-sink MP3 byte queue. `push` never blocks; old chunks age out on
/// their own rather than being bounded by count, so a momentarily slow
/// consumer does not lose data it would still be in time to catch up on,
/// while a consumer that never calls `drain` does not grow the queue
/// forever.
pub struct Mp3Queue {
    chunks: Mutex<VecDeque<Chunk>>,
    retention: Duration,
}

impl Mp3Queue {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            chunks: Mutex::new(VecDeque::new()),
            retention,
        }
    }

    pub fn push(&self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        let mut chunks = self.chunks.lock();
        chunks.push_back(Chunk {
            bytes,
            pushed_at: Instant::now(),
        });
        Self::trim(&mut chunks, self.retention);
    }

    /// Drains every queued chunk into one contiguous buffer, returning an
    /// empty `Vec` when nothing new has arrived since the last drain (spec
    /// §6 `get_mp3_data`: "empty when nothing new"). Never blocks.
    pub fn drain(&self) -> Vec<u8> {
        let mut chunks = self.chunks.lock();
        Self::trim(&mut chunks, self.retention);
        let mut out = Vec::new();
        for chunk in chunks.drain(..) {
            out.extend_from_slice(&chunk.bytes);
        }
        out
    }

    fn trim(chunks: &mut VecDeque<Chunk>, retention: Duration) {
        let now = Instant::now();
        while let Some(front) = chunks.front() {
            if now.duration_since(front.pushed_at) > retention {
                chunks.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for Mp3Queue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_concatenates_pushed_chunks_in_order() {
        let queue = Mp3Queue::new();
        queue.push(vec![1, 2, 3]);
        queue.push(vec![4, 5]);
        assert_eq!(queue.drain(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn drain_on_empty_queue_returns_empty() {
        let queue = Mp3Queue::new();
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn drain_is_idempotent_once_nothing_new_arrives() {
        let queue = Mp3Queue::new();
        queue.push(vec![9]);
        assert_eq!(queue.drain(), vec![9]);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn chunks_older_than_retention_are_dropped() {
        let queue = Mp3Queue::with_retention(Duration::from_millis(10));
        queue.push(vec![1]);
        std::thread::sleep(Duration::from_millis(30));
        queue.push(vec![2]);
        assert_eq!(queue.drain(), vec![2]);
    }

    #[test]
    fn empty_push_is_a_no_op() {
        let queue = Mp3Queue::new();
        queue.push(vec![]);
        assert!(queue.drain().is_empty());
    }
}
