// src/spec/filter.rs

//! Content inclusion filters
//!
//! A discovered modification only ends up in the patch if every filter in
//! effect accepts its content item. Filters are small trait objects chained in
//! sequence, the first rejection wins.

use crate::content::{ContentItem, ContentType};
use std::collections::BTreeSet;
use std::fmt;

/// Decides whether a content item belongs in the patch
pub trait ContentFilter: fmt::Debug + Send + Sync {
    /// Filter name for logging
    fn name(&self) -> &str;

    fn accepts(&self, item: &ContentItem) -> bool;
}

/// Top-level inclusion policy of a patch spec
///
/// With `generate_by_diff` the comparator output is authoritative and every
/// item is accepted. Otherwise only misc items explicitly listed are accepted;
/// modules and bundles are always rejected in that mode. An empty list is a
/// legal, content-free patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFilterPolicy {
    generate_by_diff: bool,
    explicit: BTreeSet<ContentItem>,
}

impl ContentFilterPolicy {
    pub fn new(generate_by_diff: bool, explicit: BTreeSet<ContentItem>) -> Self {
        Self {
            generate_by_diff,
            explicit,
        }
    }

    /// Policy that accepts everything the comparator reports
    pub fn by_diff() -> Self {
        Self::new(true, BTreeSet::new())
    }

    pub fn generate_by_diff(&self) -> bool {
        self.generate_by_diff
    }

    pub fn explicit_items(&self) -> &BTreeSet<ContentItem> {
        &self.explicit
    }
}

impl Default for ContentFilterPolicy {
    fn default() -> Self {
        Self::by_diff()
    }
}

impl ContentFilter for ContentFilterPolicy {
    fn name(&self) -> &str {
        "patch-content"
    }

    fn accepts(&self, item: &ContentItem) -> bool {
        if self.generate_by_diff {
            return true;
        }
        // Identity equality on (name, relative path)
        item.content_type() == ContentType::Misc && self.explicit.contains(item)
    }
}

/// Per-layer override applied to that layer's modules and bundles
///
/// Mirrors [`ContentFilterPolicy`] but matches module/bundle identity
/// (name, slot) instead of misc paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementContentFilter {
    generate_by_diff: bool,
    explicit: BTreeSet<ContentItem>,
}

impl ElementContentFilter {
    pub fn new(generate_by_diff: bool, explicit: BTreeSet<ContentItem>) -> Self {
        Self {
            generate_by_diff,
            explicit,
        }
    }

    pub fn generate_by_diff(&self) -> bool {
        self.generate_by_diff
    }

    pub fn explicit_items(&self) -> &BTreeSet<ContentItem> {
        &self.explicit
    }
}

impl Default for ElementContentFilter {
    fn default() -> Self {
        Self::new(true, BTreeSet::new())
    }
}

impl ContentFilter for ElementContentFilter {
    fn name(&self) -> &str {
        "element-content"
    }

    fn accepts(&self, item: &ContentItem) -> bool {
        if self.generate_by_diff {
            return true;
        }
        matches!(
            item.content_type(),
            ContentType::Module | ContentType::Bundle
        ) && self.explicit.contains(item)
    }
}

/// Filter behind `--skip-misc-files` / `--included-misc-files`
///
/// Drops every misc file except the listed relative paths. Modules and
/// bundles pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiscFileAllowlist {
    included: BTreeSet<String>,
}

impl MiscFileAllowlist {
    pub fn new<I, S>(included: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            included: included
                .into_iter()
                .map(|s| s.as_ref().trim().trim_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn included(&self) -> &BTreeSet<String> {
        &self.included
    }
}

impl ContentFilter for MiscFileAllowlist {
    fn name(&self) -> &str {
        "skip-misc-files"
    }

    fn accepts(&self, item: &ContentItem) -> bool {
        match item.relative_file() {
            Some(path) => self.included.contains(&path),
            None => true,
        }
    }
}

/// Filter chain - an item is accepted only if all filters accept it
#[derive(Debug, Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn ContentFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn add(&mut self, filter: Box<dyn ContentFilter>) {
        self.filters.push(filter);
    }

    pub fn with(mut self, filter: Box<dyn ContentFilter>) -> Self {
        self.add(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Name of the first filter rejecting the item, if any
    pub fn rejected_by(&self, item: &ContentItem) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| !f.accepts(item))
            .map(|f| f.name())
    }
}

impl ContentFilter for FilterChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn accepts(&self, item: &ContentItem) -> bool {
        self.rejected_by(item).is_none()
    }
}
