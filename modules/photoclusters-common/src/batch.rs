/// Accumulator with a fixed capacity. Items pushed past capacity are
/// dropped, so a batch never grows beyond what its stage asked for.
#[derive(Debug, Clone)]
pub struct BoundedBatch<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> BoundedBatch<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Push one item. Returns `false` if the batch was already full.
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Push items until full. Returns how many were accepted.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) -> usize {
        let mut accepted = 0;
        for item in items {
            if !self.push(item) {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
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

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Flush point: hand the accumulated items to the next stage.
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_stops_at_capacity() {
        let mut batch = BoundedBatch::with_capacity(3);
        assert_eq!(batch.extend(1..=5), 3);
        assert!(batch.is_full());
        assert_eq!(batch.remaining(), 0);
        assert!(!batch.push(6));
        assert_eq!(batch.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn zero_capacity_is_always_full() {
        let mut batch: BoundedBatch<u8> = BoundedBatch::with_capacity(0);
        assert!(batch.is_full());
        assert_eq!(batch.extend([1, 2]), 0);
        assert!(batch.is_empty());
    }
}
