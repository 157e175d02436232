//! Commodity categories and keyword-based category inference.
//!
//! A category defines the budget pool a product line draws from within one
//! base order. Sources should send an explicit category; the keyword matcher
//! is a best-effort fallback for records that only carry a product name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Commodity (oil) type of a product line.
///
/// Variant order is the declaration order used for deterministic tie-breaks
/// when choosing which category to borrow from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Palm,
    RiceBran,
    Soya,
    Sunflower,
    Mustard,
    Groundnut,
    Cottonseed,
    /// An explicit category sent by the source that is not in the built-in table.
    Other(String),
    Unknown,
}

impl Category {
    pub fn label(&self) -> &str {
        match self {
            Category::Palm => "Palm",
            Category::RiceBran => "Rice Bran",
            Category::Soya => "Soya",
            Category::Sunflower => "Sunflower",
            Category::Mustard => "Mustard",
            Category::Groundnut => "Groundnut",
            Category::Cottonseed => "Cottonseed",
            Category::Other(name) => name.as_str(),
            Category::Unknown => "Unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Category::Unknown)
    }

    /// Parses an explicit category label, matching built-in names and
    /// synonyms first. Blank labels resolve to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
            return Category::Unknown;
        }
        match CategoryMatcher::default().infer(trimmed) {
            Category::Unknown => Category::Other(trimmed.to_string()),
            known => known,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from_label(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.label().to_string()
    }
}

/// Built-in keyword table. First matching category wins, so the order of
/// entries matters.
const BUILTIN_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Palm, &["palm", "palmolein", "rbd", "pko"]),
    (Category::RiceBran, &["rice", "bran", "rbo"]),
    (Category::Soya, &["soya", "soybean", "soy", "sbo"]),
    (Category::Sunflower, &["sunflower", "sun flower", "sfo"]),
    (Category::Mustard, &["mustard", "kachi ghani", "mo"]),
    (Category::Groundnut, &["groundnut", "peanut", "gno"]),
    (Category::Cottonseed, &["cotton", "cso"]),
];

/// Keywords of this length or shorter only match whole words.
const WHOLE_WORD_MAX_LEN: usize = 3;

/// Pure, deterministic product-name → category matcher.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    rules: Vec<(Category, Vec<String>)>,
}

impl Default for CategoryMatcher {
    fn default() -> Self {
        Self {
            rules: BUILTIN_KEYWORDS
                .iter()
                .map(|(category, words)| {
                    (
                        category.clone(),
                        words.iter().map(|w| w.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl CategoryMatcher {
    /// Builds a matcher whose `overrides` (keyword → category label) are
    /// consulted before the built-in table. Overrides are applied in keyword
    /// order so the result does not depend on map iteration order.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut keywords: Vec<(&String, &String)> = overrides.iter().collect();
        keywords.sort();

        let mut rules: Vec<(Category, Vec<String>)> = keywords
            .into_iter()
            .filter(|(keyword, _)| !keyword.trim().is_empty())
            .map(|(keyword, label)| {
                (
                    Category::from_label(label),
                    vec![keyword.trim().to_lowercase()],
                )
            })
            .collect();
        rules.extend(Self::default().rules);
        Self { rules }
    }

    /// Infers a category from free text. No match yields `Unknown`.
    pub fn infer(&self, text: &str) -> Category {
        let haystack = text.to_lowercase();
        let words: Vec<&str> = haystack
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        for (category, keywords) in &self.rules {
            let hit = keywords.iter().any(|keyword| {
                if keyword.len() <= WHOLE_WORD_MAX_LEN && !keyword.contains(' ') {
                    words.iter().any(|w| w == keyword)
                } else {
                    haystack.contains(keyword.as_str())
                }
            });
            if hit {
                return category.clone();
            }
        }
        Category::Unknown
    }
}
