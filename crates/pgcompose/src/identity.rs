//! Pairing desired entities with current ones.
//!
//! Every reconciler is driven by [`reconcile_by`]: each desired item is
//! paired with the first current item it is identical to (or with nothing,
//! which means create), then every current item nobody claimed is handed over
//! alone (which means drop).

use pgcompose_schema::{
    CheckConstraint, Column, Function, Getter, Index, Table, Trigger, UniqueConstraint,
};

/// Whether current items without a desired counterpart produce drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drops {
    Emit,
    Suppress,
}

/// One side or both sides of a desired/current pairing.
#[derive(Debug, Clone, Copy)]
pub enum Pair<'a, T> {
    Create(&'a T),
    Alter(&'a T, &'a T),
    Drop(&'a T),
}

/// Pair `desired` with `current` under `identity` and collect what
/// `reconcile` produces for every pair.
///
/// Matching is first-match: a current item can satisfy more than one desired
/// item, and order within each output segment follows the desired list, then
/// the current list for drops.
pub fn reconcile_by<'a, T, O>(
    desired: &'a [T],
    current: &'a [T],
    identity: impl Fn(&T, &T) -> bool,
    mut reconcile: impl FnMut(Pair<'a, T>) -> Vec<O>,
    drops: Drops,
) -> Vec<O> {
    let mut operations = Vec::new();

    for d in desired {
        let pair = match current.iter().find(|c| identity(d, c)) {
            Some(c) => Pair::Alter(d, c),
            None => Pair::Create(d),
        };
        operations.extend(reconcile(pair));
    }

    if drops == Drops::Emit {
        for c in current {
            if !desired.iter().any(|d| identity(d, c)) {
                operations.extend(reconcile(Pair::Drop(c)));
            }
        }
    }

    operations
}

/// Entities identified by name, with an optional hint of the name they had
/// before a rename.
pub trait Named {
    fn name(&self) -> &str;
    fn previous_name(&self) -> Option<&str>;
}

/// Default identity: same name, or the desired item used to carry the current
/// item's name.
pub fn by_name<T: Named>(desired: &T, current: &T) -> bool {
    desired.name() == current.name() || desired.previous_name() == Some(current.name())
}

/// Whether the pair is a rename rather than a same-name match.
pub fn is_rename<T: Named>(desired: &T, current: &T) -> bool {
    desired.name() != current.name() && desired.previous_name() == Some(current.name())
}

macro_rules! impl_named {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Named for $ty {
                fn name(&self) -> &str {
                    &self.name
                }

                fn previous_name(&self) -> Option<&str> {
                    self.previous_name.as_deref()
                }
            }
        )*
    };
}

impl_named!(Table, Column, Index, Trigger, CheckConstraint, UniqueConstraint, Function);

impl Named for Getter {
    fn name(&self) -> &str {
        &self.name
    }

    fn previous_name(&self) -> Option<&str> {
        None
    }
}
