//! Path-compressed binary prefix trie.
//!
//! Edges carry multi-bit fragments instead of single bits, so the number of
//! nodes is bounded by the number of stored prefixes rather than their total
//! bit length. Sibling fragments never share a leading bit, which lets each
//! node keep its children in two slots indexed by that bit.

use crate::address::BitPrefix;

#[derive(Debug, Default)]
struct TrieNode {
    /// Bits on the edge leading into this node.
    fragment: BitPrefix,
    /// Children keyed by the first bit of their fragment.
    children: [Option<Box<TrieNode>>; 2],
    /// A stored prefix ends here.
    terminal: bool,
}

impl TrieNode {
    fn leaf(fragment: BitPrefix) -> Self {
        Self {
            fragment,
            children: [None, None],
            terminal: true,
        }
    }
}

/// Compressed binary trie over IPv4 bit prefixes.
///
/// `insert` stores a prefix unconditionally. It does not check whether a
/// shorter stored prefix already covers it; callers that need containment
/// semantics must call [`PrefixTrie::search`] first and insert broadest
/// prefixes before narrower ones. Skipping that step leaves redundant
/// prefixes in the trie, which is still correct for lookups.
///
/// # Examples
/// ```
/// use ipdeny::trie::PrefixTrie;
/// use ipdeny::address::BitPrefix;
///
/// let mut trie = PrefixTrie::new();
/// trie.insert("1100".parse::<BitPrefix>().unwrap());
///
/// assert!(trie.search("110011".parse().unwrap()));
/// assert!(!trie.search("11".parse().unwrap()));
/// ```
#[derive(Debug, Default)]
pub struct PrefixTrie {
    root: TrieNode,
    /// Distinct prefixes stored.
    len: usize,
    /// Non-root nodes allocated.
    nodes: usize,
}

impl PrefixTrie {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct prefixes stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the trie stores nothing.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes below the root. Never exceeds `2 * len()`.
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    /// Store `prefix`. Inserting the same prefix twice is a no-op.
    pub fn insert(&mut self, prefix: BitPrefix) {
        let mut node = &mut self.root;
        let mut rest = prefix;

        loop {
            let Some(first) = rest.bit(0) else {
                if !node.terminal {
                    node.terminal = true;
                    self.len += 1;
                }
                return;
            };
            let slot = first as usize;

            let descend = node.children[slot]
                .as_ref()
                .map(|child| rest.starts_with(&child.fragment));

            match descend {
                None => {
                    node.children[slot] = Some(Box::new(TrieNode::leaf(rest)));
                    self.nodes += 1;
                    self.len += 1;
                    return;
                }
                Some(true) => {
                    let Some(child) = node.children[slot].as_mut() else {
                        return;
                    };
                    rest = rest.skip(child.fragment.len());
                    node = &mut **child;
                }
                Some(false) => {
                    if let Some(old) = node.children[slot].take() {
                        let (split, allocated) = split_edge(old, rest);
                        node.children[slot] = Some(split);
                        self.nodes += allocated;
                        self.len += 1;
                    }
                    return;
                }
            }
        }
    }

    /// Check whether `bits` is covered by a stored prefix.
    ///
    /// Returns `true` as soon as the walk passes a terminal node, i.e. when
    /// some stored prefix is a prefix of `bits` (including `bits` itself).
    pub fn search(&self, bits: BitPrefix) -> bool {
        let mut node = &self.root;
        let mut rest = bits;

        loop {
            if node.terminal {
                return true;
            }
            let Some(first) = rest.bit(0) else {
                return node.terminal;
            };
            match &node.children[first as usize] {
                Some(child) if rest.starts_with(&child.fragment) => {
                    rest = rest.skip(child.fragment.len());
                    node = &**child;
                }
                _ => return false,
            }
        }
    }

    /// All stored prefixes, in lexicographic bit order.
    pub fn prefixes(&self) -> Vec<BitPrefix> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack = vec![(&self.root, BitPrefix::EMPTY)];

        while let Some((node, path)) = stack.pop() {
            let Some(path) = path.concat(&node.fragment) else {
                continue;
            };
            if node.terminal {
                out.push(path);
            }
            // Push '1' first so '0' pops first.
            for child in node.children.iter().rev().flatten() {
                stack.push((&**child, path));
            }
        }

        out
    }
}

/// Split `old`'s edge where it diverges from `rest`.
///
/// Returns the new node that replaces `old` in its parent, fully assembled,
/// and the number of nodes allocated.
fn split_edge(mut old: Box<TrieNode>, rest: BitPrefix) -> (Box<TrieNode>, usize) {
    let common = old.fragment.common_prefix_len(&rest);
    let mut mid = Box::new(TrieNode {
        fragment: old.fragment.take(common),
        children: [None, None],
        terminal: false,
    });
    let mut allocated = 1;

    old.fragment = old.fragment.skip(common);
    if let Some(bit) = old.fragment.bit(0) {
        mid.children[bit as usize] = Some(old);
    }

    let remainder = rest.skip(common);
    match remainder.bit(0) {
        Some(bit) => {
            mid.children[bit as usize] = Some(Box::new(TrieNode::leaf(remainder)));
            allocated += 1;
        }
        None => mid.terminal = true,
    }

    (mid, allocated)
}
