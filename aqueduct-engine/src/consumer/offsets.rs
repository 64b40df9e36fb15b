//! Commit bookkeeping for acknowledged and rejected batches.
//!
//! A rejected batch rewinds its partitions to the first failed offset. Batches
//! already in flight from a rewound partition may still be acknowledged, but
//! committing them would skip the failed messages, so the partition is held
//! back until the batch carrying the rewound offset comes through again.

use std::collections::BTreeMap;

/// `(topic, partition, offset)` of one consumed message.
pub type MessageOffset = (String, i32, i64);

#[derive(Debug, Default)]
pub struct OffsetTracker {
    /// First offset still owed, per rewound partition.
    rewound: BTreeMap<(String, i32), i64>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest offset per partition that may be committed for a successful batch.
    pub fn acknowledged(&mut self, offsets: &[MessageOffset]) -> Vec<MessageOffset> {
        let mut committable = Vec::new();
        for ((topic, partition), highest) in fold_offsets(offsets, i64::max) {
            let key = (topic, partition);
            if let Some(&owed) = self.rewound.get(&key) {
                let redelivered = offsets
                    .iter()
                    .any(|(t, p, o)| *t == key.0 && *p == key.1 && *o == owed);
                if !redelivered {
                    continue;
                }
                self.rewound.remove(&key);
            }
            committable.push((key.0, key.1, highest));
        }
        committable
    }

    /// Positions to seek back to for a failed batch, lowest per partition.
    pub fn rejected(&mut self, offsets: &[MessageOffset]) -> Vec<MessageOffset> {
        fold_offsets(offsets, i64::min)
            .into_iter()
            .map(|(key, lowest)| {
                let owed = self
                    .rewound
                    .entry(key.clone())
                    .and_modify(|owed| *owed = (*owed).min(lowest))
                    .or_insert(lowest);
                (key.0, key.1, *owed)
            })
            .collect()
    }

    pub fn is_rewound(&self, topic: &str, partition: i32) -> bool {
        self.rewound.contains_key(&(topic.to_string(), partition))
    }
}

fn fold_offsets(
    offsets: &[MessageOffset],
    pick: fn(i64, i64) -> i64,
) -> BTreeMap<(String, i32), i64> {
    let mut folded = BTreeMap::new();
    for (topic, partition, offset) in offsets {
        folded
            .entry((topic.clone(), *partition))
            .and_modify(|current: &mut i64| *current = pick(*current, *offset))
            .or_insert(*offset);
    }
    folded
}
