// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend categories.
//!
//! A [`Category`] is a bitmask classifying backends (secure storage, plain storage,
//! remotely fetched, ...). Backends are registered under a category and every read
//! or write names the category it targets.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// A bitmask tag classifying a configuration backend.
///
/// Categories behave as sets of bits. Routing picks every backend whose registered
/// category is a superset of the requested one, and orders them by
/// [`Category::specificity`] so that narrowly registered backends are consulted
/// before broadly registered ones.
///
/// # Examples
///
/// ```
/// use muxcfg::domain::Category;
///
/// let local = Category::SECURE | Category::INSECURE;
/// assert!(local.is_superset_of(Category::SECURE));
/// assert!(!local.is_superset_of(Category::REMOTE));
/// assert!(Category::ALL.is_superset_of(local));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Category(u32);

impl Category {
    /// The empty category. Every registered category is a superset of it.
    pub const NONE: Category = Category(0);
    /// Protected storage such as a keychain.
    pub const SECURE: Category = Category(0x0000_0001);
    /// Plain local storage.
    pub const INSECURE: Category = Category(0x0000_0002);
    /// Values fetched from a remote service.
    pub const REMOTE: Category = Category(0x0000_0004);
    /// Every category.
    pub const ALL: Category = Category(u32::MAX);
    /// The category typed keys read from unless told otherwise.
    pub const DEFAULT: Category = Category::NONE;

    /// Creates a category from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Category(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set union.
    pub const fn union(self, other: Category) -> Category {
        Category(self.0 | other.0)
    }

    /// Set intersection.
    pub const fn intersection(self, other: Category) -> Category {
        Category(self.0 & other.0)
    }

    /// Returns `true` if every bit of `other` is also set in `self`.
    pub const fn is_superset_of(self, other: Category) -> bool {
        self.0 & other.0 == other.0
    }

    /// Alias of [`Category::is_superset_of`].
    pub const fn contains(self, other: Category) -> bool {
        self.is_superset_of(other)
    }

    /// Sort key ordering categories from most to least specific.
    ///
    /// Fewer set bits sort first; ties are broken by the raw value. This only makes
    /// multiplex ordering deterministic, matching never depends on it.
    ///
    /// ```
    /// use muxcfg::domain::Category;
    ///
    /// let mut categories = vec![Category::ALL, Category::REMOTE, Category::SECURE];
    /// categories.sort_by_key(|c| c.specificity());
    /// assert_eq!(categories, vec![Category::SECURE, Category::REMOTE, Category::ALL]);
    /// ```
    pub const fn specificity(self) -> (u32, u32) {
        (self.0.count_ones(), self.0)
    }
}

impl BitOr for Category {
    type Output = Category;

    fn bitor(self, rhs: Category) -> Category {
        self.union(rhs)
    }
}

impl BitOrAssign for Category {
    fn bitor_assign(&mut self, rhs: Category) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Category {
    type Output = Category;

    fn bitand(self, rhs: Category) -> Category {
        self.intersection(rhs)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
