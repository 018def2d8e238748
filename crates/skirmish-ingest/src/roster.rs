//! Display-name resolution against the live roster.

use std::collections::{BTreeSet, HashMap};

use skirmish_core::roster::{Canonical, Identity};

/// What a resolved display name maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedName {
  pub identity_id: i64,
  pub canonical:   Canonical,
}

/// The outcome of resolving a set of names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
  pub resolved:   HashMap<String, ResolvedName>,
  pub unresolved: BTreeSet<String>,
}

/// Name lookup over one snapshot of the live roster.
///
/// Matching is exact and case-sensitive after trimming. The index never
/// creates identities.
#[derive(Debug, Clone, Default)]
pub struct RosterIndex {
  by_name: HashMap<String, ResolvedName>,
}

impl RosterIndex {
  pub fn new(identities: impl IntoIterator<Item = Identity>) -> Self {
    let by_name = identities
      .into_iter()
      .map(|identity| {
        let resolved = ResolvedName {
          identity_id: identity.identity_id,
          canonical:   identity.canonical(),
        };
        (identity.name.trim().to_owned(), resolved)
      })
      .collect();
    Self { by_name }
  }

  pub fn len(&self) -> usize { self.by_name.len() }

  pub fn is_empty(&self) -> bool { self.by_name.is_empty() }

  pub fn lookup(&self, name: &str) -> Option<ResolvedName> {
    self.by_name.get(name.trim()).copied()
  }

  pub fn resolve<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Resolution {
    let mut out = Resolution::default();
    for name in names {
      let name = name.trim();
      match self.lookup(name) {
        Some(resolved) => {
          out.resolved.insert(name.to_owned(), resolved);
        }
        None => {
          out.unresolved.insert(name.to_owned());
        }
      }
    }
    out
  }
}
