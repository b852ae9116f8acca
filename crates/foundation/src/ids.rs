use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique id, allocated from a monotonic counter.
///
/// Ids are never reused, so a stale id can not alias a newer object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl Id {
    pub fn new(n: u64) -> Self {
        Id(n)
    }

    pub fn next() -> Self {
        Id(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Id;

    #[test]
    fn next_ids_are_distinct_and_increasing() {
        let a = Id::next();
        let b = Id::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
