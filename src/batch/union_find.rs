//! Disjoint-set union over interned name indices.

use crate::types::NameCount;

/// Union-find with path compression and union by rank
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets holding `a` and `b`; false if they were already joined
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// Connected components of `names` under `equivalent`, as index lists.
/// Components are ordered by their first member, members ascending.
pub fn cluster_names<F>(names: &[String], mut equivalent: F) -> Vec<Vec<usize>>
where
    F: FnMut(&str, &str) -> bool,
{
    let mut set = DisjointSet::new(names.len());
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            if set.find(i) != set.find(j) && equivalent(&names[i], &names[j]) {
                set.union(i, j);
            }
        }
    }

    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut cluster_of_root: Vec<Option<usize>> = vec![None; names.len()];
    for i in 0..names.len() {
        let root = set.find(i);
        match cluster_of_root[root] {
            Some(c) => clusters[c].push(i),
            None => {
                cluster_of_root[root] = Some(clusters.len());
                clusters.push(vec![i]);
            }
        }
    }
    clusters
}

/// Equivalent names folded onto their most observed member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedCluster {
    /// Most observed member, carrying the cluster's total count
    pub representative: NameCount,
    pub members: Vec<NameCount>,
}

/// Cluster `names` and fold each component. Ties on count go to the name
/// observed first.
pub fn fold_clusters<F>(names: &[NameCount], equivalent: F) -> Vec<FoldedCluster>
where
    F: FnMut(&str, &str) -> bool,
{
    let keys: Vec<String> = names.iter().map(|n| n.name.clone()).collect();
    cluster_names(&keys, equivalent)
        .into_iter()
        .map(|indices| {
            let members: Vec<NameCount> = indices.iter().map(|&i| names[i].clone()).collect();
            let mut best = &members[0];
            for member in &members[1..] {
                if member.count > best.count {
                    best = member;
                }
            }
            let total = members.iter().map(|m| m.count).sum();
            FoldedCluster {
                representative: NameCount::new(best.name.clone(), total),
                members,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_cluster_when_all_equivalent() {
        let clusters = cluster_names(&names(&["a", "b", "c"]), |_, _| true);
        assert_eq!(clusters, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_connected_components() {
        // a~b, b~c (transitively a~c), d alone
        let input = names(&["a", "d", "b", "c"]);
        let linked = |x: &str, y: &str| {
            let mut pair = [x, y];
            pair.sort();
            pair == ["a", "b"] || pair == ["b", "c"]
        };
        assert_eq!(cluster_names(&input, linked), vec![vec![0, 2, 3], vec![1]]);
    }

    #[test]
    fn test_empty_and_singleton() {
        assert!(cluster_names(&[], |_, _| true).is_empty());
        assert_eq!(cluster_names(&names(&["x"]), |_, _| false), vec![vec![0]]);
    }

    #[test]
    fn test_fold_picks_most_observed_representative() {
        let observed = vec![
            NameCount::new("icml", 2),
            NameCount::new("cvpr", 1),
            NameCount::new("icml 2023", 5),
        ];
        let folded = fold_clusters(&observed, |a, b| a.starts_with("icml") == b.starts_with("icml"));
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].representative, NameCount::new("icml 2023", 7));
        assert_eq!(folded[0].members.len(), 2);
        assert_eq!(folded[1].representative, NameCount::new("cvpr", 1));
    }

    #[test]
    fn test_union_reports_new_merges() {
        let mut set = DisjointSet::new(3);
        assert!(set.union(0, 1));
        assert!(!set.union(1, 0));
        assert_eq!(set.find(0), set.find(1));
        assert_ne!(set.find(0), set.find(2));
    }
}
