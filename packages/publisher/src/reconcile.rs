//! Set difference between the asset names an article already owns and the
//! names its new content references.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetDiff {
    /// Referenced now, not yet owned.
    pub to_create: BTreeSet<String>,
    /// Owned, no longer referenced.
    pub to_delete: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
}

impl AssetDiff {
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Partition `existing ∪ new` into names to create, delete and keep.
///
/// Empty names are ignored on both sides. The result is a pure function of
/// its inputs, so reconciling the same pair twice yields the same diff.
pub fn diff<E, N>(existing: E, new: N) -> AssetDiff
where
    E: IntoIterator,
    E::Item: AsRef<str>,
    N: IntoIterator,
    N::Item: AsRef<str>,
{
    let existing = collect(existing);
    let new = collect(new);

    AssetDiff {
        to_create: new.difference(&existing).cloned().collect(),
        to_delete: existing.difference(&new).cloned().collect(),
        unchanged: existing.intersection(&new).cloned().collect(),
    }
}

fn collect<I>(names: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    names
        .into_iter()
        .filter(|n| !n.as_ref().is_empty())
        .map(|n| n.as_ref().to_string())
        .collect()
}
