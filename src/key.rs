//! Case-insensitive key identity

use unicase::UniCase;

/// A key compared under Unicode case folding, used for every lookup and set
/// membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FoldedKey(UniCase<String>);

impl FoldedKey {
    pub(crate) fn new(key: &str) -> Self {
        Self(UniCase::new(key.to_string()))
    }
}
