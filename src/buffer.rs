//! Fixed-capacity ring buffer
//!
//! Backs both the state history and the action history. Pushing past
//! capacity evicts the oldest entry; iteration is oldest-first.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    /// Create an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the tail, returning the evicted head if capacity was exceeded
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedBuffer<T> {
    /// Most recent `limit` entries (all when `None`), oldest first
    pub fn recent(&self, limit: Option<usize>) -> Vec<T> {
        let skip = limit.map_or(0, |n| self.items.len().saturating_sub(n));
        self.items.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut buf = BoundedBuffer::new(3);
        assert_eq!(buf.push(1), None);
        assert_eq!(buf.push(2), None);
        assert_eq!(buf.push(3), None);
        assert_eq!(buf.push(4), Some(1));

        assert_eq!(buf.recent(None), vec![2, 3, 4]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.back(), Some(&4));
    }

    #[test]
    fn test_recent_limits() {
        let mut buf = BoundedBuffer::new(10);
        for i in 0..5 {
            buf.push(i);
        }

        assert_eq!(buf.recent(Some(2)), vec![3, 4]);
        assert_eq!(buf.recent(Some(50)), vec![0, 1, 2, 3, 4]);
        assert!(buf.recent(Some(0)).is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut buf = BoundedBuffer::new(0);
        buf.push("a");
        buf.push("b");
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.recent(None), vec!["b"]);
    }

    #[test]
    fn test_clear() {
        let mut buf = BoundedBuffer::new(2);
        buf.push(1);
        buf.clear();
        assert!(buf.is_empty());
    }
}
