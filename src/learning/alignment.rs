//! Ratcliff–Obershelp sequence alignment.
//!
//! Finds the longest common contiguous block, recurses on both sides of it,
//! and reports the result either as a similarity ratio or as a list of
//! equal/replace/delete/insert opcodes that turn `a` into `b`.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// `a[a_start..a_end]` relates to `b[b_start..b_end]` as described by `tag`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

/// A run of `len` equal elements at `a[a]` and `b[b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    a: usize,
    b: usize,
    len: usize,
}

pub struct SequenceMatcher<'s, T> {
    a: &'s [T],
    b: &'s [T],
    b_index: HashMap<&'s T, Vec<usize>>,
}

impl<'s, T: Eq + Hash> SequenceMatcher<'s, T> {
    pub fn new(a: &'s [T], b: &'s [T]) -> Self {
        let mut b_index: HashMap<&T, Vec<usize>> = HashMap::new();
        for (j, item) in b.iter().enumerate() {
            b_index.entry(item).or_default().push(j);
        }
        Self { a, b, b_index }
    }

    fn longest_match(&self, a_lo: usize, a_hi: usize, b_lo: usize, b_hi: usize) -> Block {
        let mut best = Block { a: a_lo, b: b_lo, len: 0 };
        // Length of the match ending at b[j] for the previous row of a
        let mut run_lengths: HashMap<usize, usize> = HashMap::new();

        for i in a_lo..a_hi {
            let mut next_lengths = HashMap::new();
            if let Some(positions) = self.b_index.get(&self.a[i]) {
                for &j in positions {
                    if j < b_lo {
                        continue;
                    }
                    if j >= b_hi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| run_lengths.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_lengths.insert(j, k);
                    if k > best.len {
                        best = Block {
                            a: i + 1 - k,
                            b: j + 1 - k,
                            len: k,
                        };
                    }
                }
            }
            run_lengths = next_lengths;
        }
        best
    }

    fn matching_blocks(&self) -> Vec<Block> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();

        while let Some((a_lo, a_hi, b_lo, b_hi)) = queue.pop() {
            let m = self.longest_match(a_lo, a_hi, b_lo, b_hi);
            if m.len == 0 {
                continue;
            }
            blocks.push(m);
            if a_lo < m.a && b_lo < m.b {
                queue.push((a_lo, m.a, b_lo, m.b));
            }
            if m.a + m.len < a_hi && m.b + m.len < b_hi {
                queue.push((m.a + m.len, a_hi, m.b + m.len, b_hi));
            }
        }
        blocks.sort_by_key(|blk| (blk.a, blk.b));

        // Collapse adjacent blocks
        let mut merged: Vec<Block> = Vec::with_capacity(blocks.len() + 1);
        for blk in blocks {
            match merged.last_mut() {
                Some(last) if last.a + last.len == blk.a && last.b + last.len == blk.b => {
                    last.len += blk.len;
                }
                _ => merged.push(blk),
            }
        }
        merged.push(Block {
            a: self.a.len(),
            b: self.b.len(),
            len: 0,
        });
        merged
    }

    /// Edit script from `a` to `b`, in left-to-right order
    pub fn opcodes(&self) -> Vec<Opcode> {
        let mut i = 0;
        let mut j = 0;
        let mut ops = Vec::new();

        for blk in self.matching_blocks() {
            let tag = match (i < blk.a, j < blk.b) {
                (true, true) => Some(OpTag::Replace),
                (true, false) => Some(OpTag::Delete),
                (false, true) => Some(OpTag::Insert),
                (false, false) => None,
            };
            if let Some(tag) = tag {
                ops.push(Opcode {
                    tag,
                    a_start: i,
                    a_end: blk.a,
                    b_start: j,
                    b_end: blk.b,
                });
            }
            i = blk.a + blk.len;
            j = blk.b + blk.len;
            if blk.len > 0 {
                ops.push(Opcode {
                    tag: OpTag::Equal,
                    a_start: blk.a,
                    a_end: i,
                    b_start: blk.b,
                    b_end: j,
                });
            }
        }
        ops
    }

    /// 2 * matches / total length, in [0, 1]; two empty sequences score 1.0
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|blk| blk.len).sum();
        2.0 * matches as f64 / total as f64
    }
}

/// Character-level similarity ratio of two strings
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    SequenceMatcher::new(&a, &b).ratio()
}
