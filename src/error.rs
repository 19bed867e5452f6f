//! Error types: construction-time configuration failures and structural
//! invariant violations reported by `TreeHashMap::check_invariants`.

use thiserror::Error;

/// Rejected construction parameters.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("Illegal load factor: {0}")]
    InvalidLoadFactor(f32),
}

/// A structural invariant that does not hold. Every variant names the
/// bucket index where it was detected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("capacity {0} is not a power of two")]
    CapacityNotPowerOfTwo(usize),
    #[error("bucket {bucket}: node with hash {hash:#x} belongs in bucket {expected}")]
    MisplacedNode {
        bucket: usize,
        hash: u32,
        expected: usize,
    },
    #[error("bucket {0}: prev/next links disagree")]
    BrokenListLink(usize),
    #[error("bucket {0}: child does not point back at its parent")]
    BrokenParentLink(usize),
    #[error("bucket {0}: child hash is on the wrong side of its parent")]
    HashOrder(usize),
    #[error("bucket {0}: tree root is red")]
    RedRoot(usize),
    #[error("bucket {0}: red node has a red child")]
    RedRed(usize),
    #[error("bucket {0}: paths disagree on black height")]
    BlackHeight(usize),
    #[error("bucket {0}: tree root is not the head of the bucket list")]
    RootNotFirst(usize),
    #[error("bucket {bucket}: list holds {list} nodes but tree holds {tree}")]
    MembershipMismatch {
        bucket: usize,
        list: usize,
        tree: usize,
    },
    #[error("map reports {reported} entries but buckets hold {counted}")]
    SizeMismatch { reported: usize, counted: usize },
}
