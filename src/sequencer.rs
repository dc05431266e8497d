use rand::Rng;

/// Hands out request ids for one session. The first id is random so that
/// two tools running side by side are unlikely to collide. Zero is never
/// handed out.
#[derive(Debug, Clone)]
pub struct RequestIdSequencer {
    next: u16,
}

impl RequestIdSequencer {
    pub fn new() -> Self {
        let mut rng = rand::rng();
        RequestIdSequencer {
            next: rng.random_range(1..u16::MAX),
        }
    }

    #[cfg(test)]
    pub fn starting_at(first: u16) -> Self {
        RequestIdSequencer { next: first }
    }

    pub fn next_id(&mut self) -> u16 {
        let id = self.next;
        self.next = match self.next.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        id
    }
}

impl Default for RequestIdSequencer {
    fn default() -> Self {
        Self::new()
    }
}
