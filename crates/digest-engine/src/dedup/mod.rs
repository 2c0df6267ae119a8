//! Duplicate elimination stages.
//!
//! Each stage takes a candidate list and returns the survivors plus the
//! duplicate groups it formed. Survivors keep their pool order.

pub mod exact;
pub mod near;
pub mod translation;

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use crate::models::{Candidate, DedupStage, DuplicateGroup};

pub use exact::eliminate_exact_duplicates;
pub use near::{merge_near_duplicates, pair_similarity};
pub use translation::merge_translations;

/// Resolves an item's source priority: the item's own rank if present, else
/// its position in the configured source list, else after every listed source.
#[derive(Debug, Clone, Default)]
pub struct SourceRanking {
    ranks: HashMap<String, u32>,
}

impl SourceRanking {
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranks = HashMap::new();
        for (rank, source) in sources.into_iter().enumerate() {
            ranks
                .entry(source.as_ref().trim().to_lowercase())
                .or_insert(rank as u32);
        }
        Self { ranks }
    }

    pub fn rank(&self, candidate: &Candidate) -> u32 {
        candidate.item.source_priority.unwrap_or_else(|| {
            self.ranks
                .get(&candidate.item.source_name.trim().to_lowercase())
                .copied()
                .unwrap_or(u32::MAX)
        })
    }
}

/// Orders two members of a duplicate group; `Less` means `a` should survive.
///
/// Denser text wins, then the better-ranked source, then the earlier
/// publication (undated items last), then pool order.
pub fn survivor_order(a: &Candidate, b: &Candidate, ranking: &SourceRanking) -> Ordering {
    let key = |c: &Candidate| {
        (
            Reverse(c.item.information_density()),
            ranking.rank(c),
            c.item.published_at.is_none(),
            c.item.published_at,
            c.seq,
        )
    };
    key(a).cmp(&key(b))
}

/// Union-find over candidate indices.
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    pub(crate) fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = index;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            Ordering::Less => self.parent[ra] = rb,
            Ordering::Greater => self.parent[rb] = ra,
            Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }

    pub(crate) fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Connected components, each sorted ascending, ordered by first member.
    pub(crate) fn components(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Vec<usize>> = Vec::new();
        for index in 0..self.parent.len() {
            let root = self.find(index);
            let slot = *by_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(index);
        }
        components
    }
}

/// Keeps one survivor per component and records multi-member groups.
pub(crate) fn collapse(
    candidates: Vec<Candidate>,
    components: Vec<Vec<usize>>,
    stage: DedupStage,
    ranking: &SourceRanking,
) -> (Vec<Candidate>, Vec<DuplicateGroup>) {
    let mut keep = vec![false; candidates.len()];
    let mut groups = Vec::new();

    for members in components {
        let Some(survivor) = members
            .iter()
            .copied()
            .min_by(|&a, &b| survivor_order(&candidates[a], &candidates[b], ranking))
        else {
            continue;
        };
        keep[survivor] = true;

        if members.len() > 1 {
            let mut ordered = members.clone();
            ordered.sort_by_key(|&i| candidates[i].seq);
            groups.push(DuplicateGroup {
                stage,
                survivor_id: candidates[survivor].item.id.clone(),
                survivor_topic: candidates[survivor].item.topic_id.clone(),
                member_ids: ordered
                    .iter()
                    .map(|&i| candidates[i].item.id.clone())
                    .collect(),
            });
        }
    }

    let survivors = candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(candidate, kept)| kept.then_some(candidate))
        .collect();

    (survivors, groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedItem;
    use chrono::{TimeZone, Utc};

    fn candidate(seq: usize, item: FeedItem) -> Candidate {
        Candidate { seq, item }
    }

    #[test]
    fn disjoint_set_merges_transitively() {
        let mut set = DisjointSet::new(5);
        set.union(0, 1);
        set.union(3, 4);
        set.union(1, 3);
        assert!(set.same(0, 4));
        assert!(!set.same(0, 2));
        assert_eq!(set.components(), vec![vec![0, 1, 3, 4], vec![2]]);
    }

    #[test]
    fn denser_item_survives() {
        let ranking = SourceRanking::default();
        let thin = candidate(0, FeedItem::new("a", "u", "Rates rise", "S"));
        let rich = candidate(
            1,
            FeedItem::new("b", "u", "Rates rise", "S").with_summary("The central bank lifted rates by half a point"),
        );
        assert_eq!(survivor_order(&rich, &thin, &ranking), Ordering::Less);
    }

    #[test]
    fn ties_fall_through_priority_then_time_then_sequence() {
        let ranking = SourceRanking::new(["Reuters", "AP"]);
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();

        let ap = candidate(0, FeedItem::new("a", "u", "Rates rise", "AP").with_published_at(early));
        let reuters = candidate(1, FeedItem::new("b", "u", "Rates rise", "Reuters").with_published_at(late));
        assert_eq!(survivor_order(&reuters, &ap, &ranking), Ordering::Less);

        let first = candidate(2, FeedItem::new("c", "u", "Rates rise", "AP").with_published_at(late));
        let undated = candidate(3, FeedItem::new("d", "u", "Rates rise", "AP"));
        assert_eq!(survivor_order(&ap, &first, &ranking), Ordering::Less);
        assert_eq!(survivor_order(&first, &undated, &ranking), Ordering::Less);

        let twin = candidate(4, FeedItem::new("e", "u", "Rates rise", "AP").with_published_at(early));
        assert_eq!(survivor_order(&ap, &twin, &ranking), Ordering::Less);
    }

    #[test]
    fn item_priority_overrides_configured_list() {
        let ranking = SourceRanking::new(["Reuters"]);
        let listed = candidate(0, FeedItem::new("a", "u", "T", "Reuters"));
        let pinned = candidate(1, FeedItem::new("b", "u", "T", "Blog").with_source_priority(0));
        let unknown = candidate(2, FeedItem::new("c", "u", "T", "Blog"));
        assert_eq!(ranking.rank(&listed), 0);
        assert_eq!(ranking.rank(&pinned), 0);
        assert_eq!(ranking.rank(&unknown), u32::MAX);
    }

    #[test]
    fn collapse_keeps_pool_order() {
        let ranking = SourceRanking::default();
        let candidates = vec![
            candidate(0, FeedItem::new("a", "u", "One", "S")),
            candidate(1, FeedItem::new("b", "u", "Two words", "S")),
            candidate(2, FeedItem::new("c", "u", "Three", "S")),
        ];
        let (survivors, groups) = collapse(
            candidates,
            vec![vec![0, 1], vec![2]],
            DedupStage::NearDuplicate,
            &ranking,
        );
        let ids: Vec<_> = survivors.iter().map(|c| c.item.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].survivor_id, "b");
        assert_eq!(groups[0].member_ids, vec!["a", "b"]);
    }
}
