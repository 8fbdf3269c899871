//! Virtual read heads: detect sequential scans and size read-ahead.
//!
//! Each head stands for one hypothesized forward scan. A miss that lands in
//! the window a head would fetch next doubles that head's speed; anything
//! else starts a new head at speed one. Random access therefore never
//! accelerates while a scan converges to `max_speed` chunks per fetch.

/// One hypothesized sequential stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHead {
    pub start_chunk: u64,
    pub speed: u64,
}

impl ReadHead {
    fn next_window(&self, max_speed: u64) -> (u64, u64) {
        let next_start = self.start_chunk + self.speed;
        let next_speed = max_speed.min(self.speed * 2);
        (next_start, next_speed)
    }
}

/// MRU-ordered list of at most `max_heads` heads.
#[derive(Debug, Clone)]
pub struct ReadHeadPredictor {
    heads: Vec<ReadHead>,
    max_heads: usize,
    max_speed: u64,
}

impl ReadHeadPredictor {
    pub fn new(max_heads: usize, max_speed: u64) -> Self {
        Self {
            heads: Vec::with_capacity(max_heads + 1),
            max_heads: max_heads.max(1),
            max_speed: max_speed.max(1),
        }
    }

    /// Find the head whose next fetch covers `wanted`, or start a new one.
    ///
    /// The returned head is at least `min(min_speed, max_speed)` fast.
    pub fn acquire(&mut self, wanted: u64, min_speed: u64) -> ReadHead {
        let floor = min_speed.clamp(1, self.max_speed);
        let hit = self.heads.iter().position(|head| {
            let (next_start, next_speed) = head.next_window(self.max_speed);
            wanted >= next_start && wanted < next_start + next_speed
        });

        let mut head = match hit {
            Some(i) => {
                let mut head = self.heads.remove(i);
                let (next_start, next_speed) = head.next_window(self.max_speed);
                head.start_chunk = next_start;
                head.speed = next_speed;
                head
            }
            None => ReadHead {
                start_chunk: wanted,
                speed: 1,
            },
        };
        head.speed = head.speed.max(floor);

        self.heads.insert(0, head);
        self.heads.truncate(self.max_heads);
        head
    }

    /// Heads, most recently used first.
    pub fn heads(&self) -> &[ReadHead] {
        &self.heads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_read_starts_slow_head() {
        let mut p = ReadHeadPredictor::new(3, 8);
        let head = p.acquire(42, 1);
        assert_eq!(head, ReadHead { start_chunk: 42, speed: 1 });
        assert_eq!(p.heads().len(), 1);
    }

    #[test]
    fn test_second_sequential_read_reuses_head() {
        let mut p = ReadHeadPredictor::new(3, 8);
        p.acquire(0, 1);
        let head = p.acquire(1, 1);
        assert_eq!(head, ReadHead { start_chunk: 1, speed: 2 });
        assert_eq!(p.heads().len(), 1);
    }

    #[test]
    fn test_sequential_scan_doubles_up_to_max() {
        let mut p = ReadHeadPredictor::new(3, 8);
        let mut next = 0;
        let mut speeds = Vec::new();
        for _ in 0..7 {
            let head = p.acquire(next, 1);
            speeds.push(head.speed);
            next = head.start_chunk + head.speed;
        }
        assert_eq!(speeds, vec![1, 2, 4, 8, 8, 8, 8]);
        assert_eq!(p.heads().len(), 1);
    }

    #[test]
    fn test_lru_head_is_evicted() {
        let mut p = ReadHeadPredictor::new(3, 8);
        for origin in [0, 100, 200, 300] {
            p.acquire(origin, 1);
        }
        let starts: Vec<u64> = p.heads().iter().map(|h| h.start_chunk).collect();
        assert_eq!(starts, vec![300, 200, 100]);
    }

    #[test]
    fn test_hit_promotes_to_front() {
        let mut p = ReadHeadPredictor::new(3, 8);
        p.acquire(0, 1);
        p.acquire(100, 1);
        p.acquire(200, 1);
        // continue the oldest scan
        p.acquire(1, 1);
        let starts: Vec<u64> = p.heads().iter().map(|h| h.start_chunk).collect();
        assert_eq!(starts, vec![1, 200, 100]);
        // a fourth origin now evicts the scan at 100
        p.acquire(500, 1);
        let starts: Vec<u64> = p.heads().iter().map(|h| h.start_chunk).collect();
        assert_eq!(starts, vec![500, 1, 200]);
    }

    #[test]
    fn test_min_speed_raises_but_never_exceeds_max() {
        let mut p = ReadHeadPredictor::new(3, 8);
        assert_eq!(p.acquire(0, 5).speed, 5);
        assert_eq!(p.acquire(1000, 50).speed, 8);
        // a later request with a smaller floor keeps the speed
        let head = p.acquire(1008, 1);
        assert_eq!(head.speed, 8);
    }

    #[test]
    fn test_random_access_never_accelerates() {
        let mut p = ReadHeadPredictor::new(3, 8);
        for wanted in [50, 3, 90, 17, 64, 0, 33] {
            assert_eq!(p.acquire(wanted, 1).speed, 1);
        }
    }
}
