//! Named event counters

use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Counter {
    counters: BTreeMap<&'static str, u64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &'static str, value: u64) {
        *self.counters.entry(name).or_insert(0) += value;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }

    /// Counters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counters.iter().map(|(name, value)| (*name, *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_name() {
        let mut counter = Counter::new();
        counter.increment("presented");
        counter.increment("presented");
        counter.add("dropped", 3);
        assert_eq!(counter.get("presented"), 2);
        assert_eq!(counter.get("dropped"), 3);
        assert_eq!(counter.get("timed_out"), 0);

        let names: Vec<_> = counter.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["dropped", "presented"]);

        counter.reset_all();
        assert_eq!(counter.get("presented"), 0);
    }
}
