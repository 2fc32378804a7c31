/// A spanning n-ary tree over `n` roster positions, rooted at position 0
/// (the proposing server, re-indexed into "root-relative" positions by the
/// caller). `children[i]` lists `i`'s direct descendants.
#[derive(Debug, Clone)]
pub struct Tree {
    pub fanout: usize,
    pub children: Vec<Vec<usize>>,
}

impl Tree {
    /// Builds a complete n-ary tree (fan-out = `fanout`) over `n` nodes,
    /// assigning descendants breadth-first: node `i`'s children are at
    /// positions `fanout*i + 1 ..= fanout*i + fanout`, clipped to `n`.
    pub fn build(n: usize, fanout: usize) -> Self {
        let mut children = vec![Vec::new(); n];
        for i in 0..n {
            let first_child = fanout * i + 1;
            for c in first_child..(first_child + fanout).min(n) {
                children[i].push(c);
            }
        }
        Tree { fanout, children }
    }

    /// Total node count of the subtree rooted at `node` (including `node`).
    pub fn subtree_size(&self, node: usize) -> usize {
        1 + self
            .children
            .get(node)
            .map(|kids| kids.iter().map(|&c| self.subtree_size(c)).sum())
            .unwrap_or(0)
    }
}
