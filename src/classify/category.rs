use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Topic label assigned to an entry.
///
/// Every variant except [`Category::Unknown`] corresponds to one output index
/// of the classifier. `Unknown` is the sentinel for failed or unmapped
/// predictions and has no index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "WELLNESS")]
    Wellness,
    #[serde(rename = "POLITICS")]
    Politics,
    #[serde(rename = "ENTERTAINMENT")]
    Entertainment,
    #[serde(rename = "TRAVEL")]
    Travel,
    #[serde(rename = "STYLE & BEAUTY")]
    StyleBeauty,
    #[serde(rename = "PARENTING")]
    Parenting,
    #[serde(rename = "FOOD & DRINK")]
    FoodDrink,
    #[serde(rename = "WORLD NEWS")]
    WorldNews,
    #[serde(rename = "BUSINESS")]
    Business,
    #[serde(rename = "SPORTS")]
    Sports,
    Unknown,
}

impl Category {
    /// The classifier's label set, in output-index order.
    pub const ALL: [Category; 10] = [
        Category::Wellness,
        Category::Politics,
        Category::Entertainment,
        Category::Travel,
        Category::StyleBeauty,
        Category::Parenting,
        Category::FoodDrink,
        Category::WorldNews,
        Category::Business,
        Category::Sports,
    ];

    /// Longest label the storage column accepts.
    pub const MAX_LABEL_LEN: usize = 30;

    pub fn label(self) -> &'static str {
        match self {
            Category::Wellness => "WELLNESS",
            Category::Politics => "POLITICS",
            Category::Entertainment => "ENTERTAINMENT",
            Category::Travel => "TRAVEL",
            Category::StyleBeauty => "STYLE & BEAUTY",
            Category::Parenting => "PARENTING",
            Category::FoodDrink => "FOOD & DRINK",
            Category::WorldNews => "WORLD NEWS",
            Category::Business => "BUSINESS",
            Category::Sports => "SPORTS",
            Category::Unknown => "Unknown",
        }
    }

    /// Model output index, `None` for [`Category::Unknown`].
    pub fn index(self) -> Option<usize> {
        Self::ALL.iter().position(|&c| c == self)
    }

    pub fn from_index(index: usize) -> Option<Category> {
        Self::ALL.get(index).copied()
    }

    pub fn is_unknown(self) -> bool {
        self == Category::Unknown
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown category label: {0}")]
pub struct ParseCategoryError(String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Category::Unknown.label() {
            return Ok(Category::Unknown);
        }
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Index ↔ category lookup built once per classifier.
///
/// Keeps the model's output layout explicit: a model exported with a
/// different label order is described by a different table, never by
/// recomputing the mapping per call.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    by_index: HashMap<usize, Category>,
    by_category: HashMap<Category, usize>,
}

impl CategoryTable {
    /// Table for the standard label order ([`Category::ALL`]).
    pub fn new() -> Self {
        Self::from_pairs(Category::ALL.into_iter().enumerate())
    }

    /// Builds a table from explicit `(index, category)` pairs.
    ///
    /// `Unknown` is never mapped; pairs naming it are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, Category)>) -> Self {
        let mut by_index = HashMap::new();
        let mut by_category = HashMap::new();
        for (index, category) in pairs {
            if category.is_unknown() {
                continue;
            }
            by_index.insert(index, category);
            by_category.insert(category, index);
        }
        Self {
            by_index,
            by_category,
        }
    }

    pub fn category(&self, index: usize) -> Option<Category> {
        self.by_index.get(&index).copied()
    }

    pub fn index(&self, category: Category) -> Option<usize> {
        self.by_category.get(&category).copied()
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new()
    }
}
