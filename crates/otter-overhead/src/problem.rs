//! Kinds of collection overhead

use serde::Serialize;

/// Problem a collection instance can exhibit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemKind {
    /// No elements
    Empty,
    /// No elements now, but was modified at some point
    EmptyUsed,
    /// No elements and never modified
    EmptyUnused,
    /// Sparse and no bigger than its default capacity
    SparseSmall,
    /// Sparse and above its default capacity
    SparseLarge,
    /// Standalone array with mostly null slots
    SparseArray,
    /// Few elements relative to fixed implementation cost
    Small,
    /// Elements are boxed primitives
    Boxed,
    /// Weak map whose values reference their keys
    WeakMapWithBackRefs,
    /// Collection of byte arrays
    Bar,
    /// Array of length zero
    LengthZero,
    /// Array of length one
    LengthOne,
    /// Array whose trailing slots are all zero
    Lzt,
    /// Integral array whose high bytes are never used
    UnusedHiBytes,
}

impl ProblemKind {
    /// Number of kinds
    pub const COUNT: usize = 14;

    /// Every kind in declaration order
    pub const ALL: [ProblemKind; Self::COUNT] = [
        ProblemKind::Empty,
        ProblemKind::EmptyUsed,
        ProblemKind::EmptyUnused,
        ProblemKind::SparseSmall,
        ProblemKind::SparseLarge,
        ProblemKind::SparseArray,
        ProblemKind::Small,
        ProblemKind::Boxed,
        ProblemKind::WeakMapWithBackRefs,
        ProblemKind::Bar,
        ProblemKind::LengthZero,
        ProblemKind::LengthOne,
        ProblemKind::Lzt,
        ProblemKind::UnusedHiBytes,
    ];

    /// Position in [`ProblemKind::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short label for reports
    pub fn label(self) -> &'static str {
        match self {
            ProblemKind::Empty => "empty",
            ProblemKind::EmptyUsed => "empty, used",
            ProblemKind::EmptyUnused => "empty, unused",
            ProblemKind::SparseSmall => "small sparse",
            ProblemKind::SparseLarge => "large sparse",
            ProblemKind::SparseArray => "sparse array",
            ProblemKind::Small => "small",
            ProblemKind::Boxed => "boxed",
            ProblemKind::WeakMapWithBackRefs => "weak map with back refs",
            ProblemKind::Bar => "byte arrays",
            ProblemKind::LengthZero => "length 0",
            ProblemKind::LengthOne => "length 1",
            ProblemKind::Lzt => "trailing zeros",
            ProblemKind::UnusedHiBytes => "unused high bytes",
        }
    }
}
