//! Page addressing.
//!
//! Everything inside the engine is keyed by [`PageIndex`] (zero-based). The
//! only place a [`DisplayPageNumber`] (one-based) is created is
//! [`PageIndex::display`], which the context resolver calls when it groups
//! its output.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based page index, as used by the extraction backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PageIndex(pub usize);

impl PageIndex {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// The following page.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The preceding page, or `None` on the first page.
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    /// Convert to the one-based number shown to readers.
    pub fn display(self) -> DisplayPageNumber {
        DisplayPageNumber(self.0 + 1)
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One-based page number as printed in letters and reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayPageNumber(usize);

impl DisplayPageNumber {
    /// Returns `None` for zero, which is not a valid human page number.
    pub fn new(number: usize) -> Option<Self> {
        (number >= 1).then_some(Self(number))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for DisplayPageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
