//! Scope labels select which policy fragments apply to a caller.
//!
//! A scope is a colon-separated list of labels such as `browser:mozilla`.
//! A fragment labelled `mozilla` applies to that scope at depth 2, one
//! labelled `browser` at depth 1, and the default label `:` applies to
//! every scope at depth 0. Deeper fragments override shallower ones.

use super::{PolicyList, PolicySet, PolicyType};
use crate::error::PolicyError;
use tracing::warn;

/// Label of the fragment that applies to every scope
pub const DEFAULT_LABEL: &str = ":";

const LEVEL_DELIMITER: char = ':';

/// Longest scope string accepted
pub const MAX_SCOPE_LEN: usize = 256;

/// Most colon-separated levels accepted in a scope
pub const MAX_SCOPE_LEVELS: usize = 16;

/// A fragment label may only contain `:` if it is the default label
pub fn validate_label(label: &str) -> Result<(), PolicyError> {
    if label.is_empty() || (label.contains(LEVEL_DELIMITER) && label != DEFAULT_LABEL) {
        return Err(PolicyError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

/// Depth at which `label` applies to `scope`, or `None` if it does not.
///
/// Without a scope every fragment is relevant; the default label sits at
/// depth 0 and every other label at depth 1.
pub fn check_relevance(label: &str, scope: Option<&str>) -> Result<Option<usize>, PolicyError> {
    validate_label(label)?;
    if label == DEFAULT_LABEL {
        return Ok(Some(0));
    }
    let Some(scope) = scope else {
        return Ok(Some(1));
    };

    if scope.len() > MAX_SCOPE_LEN {
        return Err(PolicyError::ScopeTooComplex(format!(
            "{} bytes, limit {}",
            scope.len(),
            MAX_SCOPE_LEN
        )));
    }
    let levels = scope.split(LEVEL_DELIMITER).count();
    if levels > MAX_SCOPE_LEVELS {
        return Err(PolicyError::ScopeTooComplex(format!(
            "{} levels, limit {}",
            levels, MAX_SCOPE_LEVELS
        )));
    }

    Ok(scope
        .split(LEVEL_DELIMITER)
        .position(|level| !level.is_empty() && level == label)
        .map(|index| index + 1))
}

#[derive(Debug, Clone)]
struct Override {
    label: String,
    depth: usize,
    lists: Vec<(PolicyType, PolicyList)>,
}

/// Relevant fragments, ordered from general to specific
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    entries: Vec<Override>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the list a fragment defines for one keyword. A second
    /// definition of the same keyword under the same label replaces the
    /// first.
    pub fn store(&mut self, label: &str, depth: usize, ptype: PolicyType, list: PolicyList) {
        let existing = self
            .entries
            .iter()
            .take_while(|o| o.depth <= depth)
            .position(|o| o.label == label);

        let index = match existing {
            Some(index) => index,
            None => {
                let at = self
                    .entries
                    .iter()
                    .position(|o| o.depth > depth)
                    .unwrap_or(self.entries.len());
                self.entries.insert(
                    at,
                    Override {
                        label: label.to_string(),
                        depth,
                        lists: Vec::new(),
                    },
                );
                at
            }
        };

        let lists = &mut self.entries[index].lists;
        if let Some(slot) = lists.iter_mut().find(|(existing, _)| *existing == ptype) {
            warn!(label, keyword = %ptype, "Duplicate policy definition; using latest");
            slot.1 = list;
        } else {
            lists.push((ptype, list));
        }
    }

    /// Keep only the most general override
    pub fn retain_most_general(&mut self) {
        self.entries.truncate(1);
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|o| o.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply overrides general to specific on top of `base`; for each
    /// keyword the most specific definition wins
    pub fn apply(self, mut base: PolicySet) -> PolicySet {
        for over in self.entries {
            for (ptype, list) in over.lists {
                base.set_list(ptype, list);
            }
        }
        base
    }
}
