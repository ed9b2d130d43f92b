//! Priority-ordered set shared by the resolver chain and the
//! post-construction pipeline.
//!
//! Items are distinct (adding an item twice is a no-op) and iterate from
//! the highest priority down; equal priorities keep insertion order.

use std::fmt;

use once_cell::sync::OnceCell;
use serde::ser::{Serialize, Serializer};

/// Named priority levels.
///
/// Higher runs first. Any `i32` is accepted where a priority is expected;
/// values below 1 are clamped to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    #[inline]
    pub fn value(self) -> i32 {
        match self {
            Priority::Low => 32,
            Priority::Medium => 64,
            Priority::High => 128,
        }
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> Self {
        priority.value()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

struct Entry<T> {
    item: T,
    priority: i32,
}

/// Insertion-ordered set of distinct items, iterated by descending priority.
///
/// A locked collection silently ignores `add`, `delete` and `clear`.
///
/// # Examples
/// ```
/// use autowire_container::priority::PriorityCollection;
///
/// let mut set = PriorityCollection::new();
/// set.add("five", 5).add("ten", 10).add("one", 1);
///
/// let order: Vec<_> = set.values().copied().collect();
/// assert_eq!(order, ["ten", "five", "one"]);
/// ```
pub struct PriorityCollection<T> {
    entries: Vec<Entry<T>>,
    sorted: OnceCell<Vec<usize>>,
    locked: bool,
}

impl<T: PartialEq> PriorityCollection<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            sorted: OnceCell::new(),
            locked: false,
        }
    }

    /// Adds `item` with `priority` unless it is already present.
    pub fn add(&mut self, item: T, priority: impl Into<i32>) -> &mut Self {
        if self.locked || self.has(&item) {
            return self;
        }

        self.entries.push(Entry {
            item,
            priority: priority.into().max(1),
        });
        self.sorted.take();
        self
    }

    /// Removes `item`; returns `false` if absent or locked.
    pub fn delete(&mut self, item: &T) -> bool {
        if self.locked {
            return false;
        }

        match self.index_of(item) {
            Some(index) => {
                self.entries.remove(index);
                self.sorted.take();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        if self.locked {
            return;
        }
        self.entries.clear();
        self.sorted.take();
    }

    pub fn has(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Priority `item` was added with, if present.
    pub fn priority_of(&self, item: &T) -> Option<i32> {
        self.index_of(item).map(|index| self.entries[index].priority)
    }

    fn index_of(&self, item: &T) -> Option<usize> {
        self.entries.iter().position(|entry| entry.item == *item)
    }
}

impl<T> PriorityCollection<T> {
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Items by descending priority, ties in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.order().iter().map(|&index| &self.entries[index].item)
    }

    /// Items by ascending priority; ties still keep insertion order.
    pub fn values_reversed(&self) -> impl Iterator<Item = &T> {
        let order = self.order();
        let mut groups: Vec<&[usize]> = order
            .chunk_by(|&a, &b| self.entries[a].priority == self.entries[b].priority)
            .collect();
        groups.reverse();
        groups
            .into_iter()
            .flatten()
            .map(|&index| &self.entries[index].item)
    }

    /// Pairs of item and priority, in iteration order.
    pub fn entries(&self) -> impl Iterator<Item = (&T, i32)> {
        self.order().iter().map(|&index| {
            let entry = &self.entries[index];
            (&entry.item, entry.priority)
        })
    }

    fn order(&self) -> &[usize] {
        self.sorted.get_or_init(|| {
            let mut order: Vec<usize> = (0..self.entries.len()).collect();
            // stable: equal priorities stay in insertion order
            order.sort_by_key(|&index| std::cmp::Reverse(self.entries[index].priority));
            order
        })
    }
}

impl<T: PartialEq> Default for PriorityCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for PriorityCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}

/// Serializes as the ordered sequence of items.
impl<T: Serialize> Serialize for PriorityCollection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values())
    }
}
