use std::collections::HashSet;

use time::OffsetDateTime;

use super::Item;

/// Issues item ids from the wall clock in milliseconds, bumped past every id
/// already handed out or observed so two items never share one.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: i64,
    taken: HashSet<i64>,
}

impl IdGenerator {
    pub fn seeded(items: &[Item]) -> Self {
        let mut ids = Self::default();
        for item in items {
            ids.observe(item.id);
        }
        ids
    }

    pub fn observe(&mut self, id: i64) {
        self.last = self.last.max(id);
        self.taken.insert(id);
    }

    pub fn next_id(&mut self) -> i64 {
        let mut id = match self.last.checked_add(1) {
            Some(next) => now_millis().max(next),
            // Counter exhausted: search upwards from the clock for a gap.
            None => now_millis(),
        };
        while self.taken.contains(&id) {
            id = id.checked_add(1).unwrap_or(1);
        }
        self.observe(id);
        id
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_strictly_increase_within_one_millisecond() {
        let mut ids = IdGenerator::default();
        let mut previous = ids.next_id();
        for _ in 0..1_000 {
            let next = ids.next_id();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn seeded_generator_skips_ids_from_the_future() {
        let far_future = now_millis() + 10_000_000;
        let item = Item::dated(far_future, "later", "2099-01-01");
        let mut ids = IdGenerator::seeded(&[item]);
        assert_eq!(ids.next_id(), far_future + 1);
    }

    #[test]
    fn exhausted_counter_falls_back_to_unused_ids() {
        let mut ids = IdGenerator::seeded(&[Item::permanent(i64::MAX, "max")]);
        let mut issued = HashSet::new();
        for _ in 0..100 {
            let id = ids.next_id();
            assert_ne!(id, i64::MAX);
            assert!(issued.insert(id), "id {id} issued twice");
        }
    }
}
