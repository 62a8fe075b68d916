use crate::interval::CnvInterval;

/// Append-only arena of every interval ever created, raw or merged.
///
/// An interval's id is its position in the pool. Nothing is ever removed:
/// merging retires the two parents by pointing them at the new interval.
#[derive(Debug, Default, Clone)]
pub struct IntervalPool {
    intervals: Vec<CnvInterval>,
}

impl IntervalPool {
    pub fn new() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            intervals: Vec::with_capacity(capacity),
        }
    }

    /// Build a fresh pool from the active intervals of `other`, as if they
    /// were raw input: ids are reassigned and ranks reset to 1.
    pub fn from_active(other: &IntervalPool) -> Self {
        let mut pool = IntervalPool::with_capacity(other.active_count());
        for interval in other.active() {
            let mut fresh = interval.clone();
            fresh.rank = 1;
            pool.append(fresh);
        }
        pool
    }

    /// Append an interval, assigning it the next id
    pub fn append(&mut self, mut interval: CnvInterval) -> usize {
        let id = self.intervals.len();
        interval.id = id;
        interval.merge_target = None;
        self.intervals.push(interval);
        id
    }

    pub fn get(&self, id: usize) -> Option<&CnvInterval> {
        self.intervals.get(id)
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// All intervals in creation order
    pub fn iter(&self) -> impl Iterator<Item = &CnvInterval> {
        self.intervals.iter()
    }

    /// Intervals that have not been absorbed into a merge
    pub fn active(&self) -> impl Iterator<Item = &CnvInterval> {
        self.intervals.iter().filter(|interval| !interval.is_retired())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub(crate) fn as_slice(&self) -> &[CnvInterval] {
        &self.intervals
    }

    /// Mark `id` as absorbed into `target`. Happens at most once per interval.
    pub(crate) fn retire_into(&mut self, id: usize, target: usize) {
        debug_assert!(target > id, "merge target must be newer than its parent");
        let interval = &mut self.intervals[id];
        assert!(
            interval.merge_target.is_none(),
            "interval {} is already retired into {:?}",
            id,
            interval.merge_target
        );
        interval.merge_target = Some(target);
    }

    /// Chain of merge targets starting at `id` (excluded) up to its root
    pub fn lineage(&self, id: usize) -> impl Iterator<Item = &CnvInterval> + '_ {
        let mut next = self.get(id).and_then(|interval| interval.merge_target);
        std::iter::from_fn(move || {
            let current = self.get(next?)?;
            next = current.merge_target;
            Some(current)
        })
    }

    /// The active interval that finally absorbed `id` (itself if still active)
    pub fn root_of(&self, id: usize) -> Option<&CnvInterval> {
        let interval = self.get(id)?;
        Some(self.lineage(id).last().unwrap_or(interval))
    }

    /// Ids of the raw calls that were merged, directly or transitively, into `id`
    pub fn raw_members(&self, id: usize) -> Vec<usize> {
        if id >= self.len() {
            return Vec::new();
        }
        // Parents always have smaller ids than their target, so a single
        // backwards sweep sees every target before its parents.
        let mut in_subtree = vec![false; id + 1];
        in_subtree[id] = true;
        let mut members = Vec::new();
        for interval in self.intervals[..=id].iter().rev() {
            let inside = interval.id == id
                || interval
                    .merge_target
                    .is_some_and(|target| target <= id && in_subtree[target]);
            if !inside {
                continue;
            }
            in_subtree[interval.id] = true;
            if interval.rank == 1 {
                members.push(interval.id);
            }
        }
        members.reverse();
        members
    }
}
