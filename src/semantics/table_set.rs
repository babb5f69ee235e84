//! Growable sets of table identities.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bit_set::BitSet;

/// Set of tables, identified by the position in which the analyzer first
/// registered them.
///
/// Backed by a growable bit vector, so a statement may reference any number
/// of tables. Equality, ordering and hashing depend only on the members, not
/// on the capacity the set has grown to.
#[derive(Clone, Default)]
pub struct TableSet(BitSet);

impl TableSet {
    /// Creates an empty set.
    #[must_use]
    pub fn empty() -> Self {
        TableSet(BitSet::new())
    }

    /// Creates a set holding one table.
    #[must_use]
    pub fn single(table: usize) -> Self {
        let mut bits = BitSet::with_capacity(table + 1);
        bits.insert(table);
        TableSet(bits)
    }

    /// Returns true if `table` is a member.
    #[must_use]
    pub fn contains(&self, table: usize) -> bool {
        self.0.contains(table)
    }

    /// Adds `table` to the set.
    pub fn insert(&mut self, table: usize) {
        self.0.insert(table);
    }

    /// Returns the union of both sets.
    #[must_use]
    pub fn merge(&self, other: &TableSet) -> TableSet {
        let mut merged = self.clone();
        merged.merge_in_place(other);
        merged
    }

    /// Adds every member of `other` to this set.
    pub fn merge_in_place(&mut self, other: &TableSet) {
        self.0.union_with(&other.0);
    }

    /// Returns the members present in both sets.
    #[must_use]
    pub fn intersection(&self, other: &TableSet) -> TableSet {
        let mut common = self.clone();
        common.0.intersect_with(&other.0);
        common
    }

    /// Returns the members of this set that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &TableSet) -> TableSet {
        let mut rest = self.clone();
        rest.0.difference_with(&other.0);
        rest
    }

    /// Returns true if every member of this set is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &TableSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns true if the sets have no member in common.
    #[must_use]
    pub fn is_disjoint(&self, other: &TableSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tables in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the only member, if the set holds exactly one table.
    #[must_use]
    pub fn single_table(&self) -> Option<usize> {
        let mut iter = self.0.iter();
        match (iter.next(), iter.next()) {
            (Some(table), None) => Some(table),
            _ => None,
        }
    }

    /// Iterates the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter()
    }
}

impl FromIterator<usize> for TableSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = TableSet::empty();
        for table in iter {
            set.insert(table);
        }
        set
    }
}

impl PartialEq for TableSet {
    fn eq(&self, other: &Self) -> bool {
        self.0.iter().eq(other.0.iter())
    }
}

impl Eq for TableSet {}

impl PartialOrd for TableSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TableSet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().cmp(other.0.iter())
    }
}

impl Hash for TableSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for table in self.0.iter() {
            table.hash(state);
        }
        self.len().hash(state);
    }
}

impl fmt::Debug for TableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for TableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, table) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{table}")?;
        }
        f.write_str("}")
    }
}
