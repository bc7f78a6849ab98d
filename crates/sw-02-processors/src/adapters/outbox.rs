use crate::ports::processor::Outbox;
use std::collections::VecDeque;

/// Fixed-capacity outbox. Refuses items once full until drained.
#[derive(Debug)]
pub struct BoundedOutbox<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> BoundedOutbox<T> {
    /// Capacity is at least one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Take everything buffered so far, oldest first.
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, T> {
        self.items.drain(..)
    }
}

impl<T> Outbox<T> for BoundedOutbox<T> {
    fn offer(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_when_full() {
        let mut outbox = BoundedOutbox::new(2);
        assert_eq!(outbox.offer(1), Ok(()));
        assert_eq!(outbox.offer(2), Ok(()));
        assert_eq!(outbox.offer(3), Err(3));

        assert_eq!(outbox.drain().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(outbox.offer(3), Ok(()));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut outbox = BoundedOutbox::new(0);
        assert_eq!(outbox.capacity(), 1);
        assert!(outbox.offer("x").is_ok());
        assert!(outbox.is_full());
    }
}
