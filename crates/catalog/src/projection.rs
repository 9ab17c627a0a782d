//! Sorted, filtered, display-ready views of the recipe collection.
//!
//! Projections are pure functions of the collection and the view options.
//! They never touch the records they read; every call returns fresh data.

use std::{cmp::Ordering, fmt, str::FromStr};

use entities::{Rating, Recipe, RecipeId};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Order in which recipes are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Collection order as delivered (newest first).
    #[default]
    Newest,
    /// Reverse of the delivered order.
    Oldest,
    /// By name, ascending.
    Name,
    /// Highest rating first.
    RatingHigh,
    /// Lowest rating first.
    RatingLow,
    /// Cooked recipes first; otherwise delivered order.
    Cooked,
    /// Uncooked recipes first; otherwise delivered order.
    NotCooked,
    /// By category, uncategorized last.
    Category,
}

impl SortKey {
    /// Every sort key, in menu order.
    pub const ALL: [SortKey; 8] = [
        Self::Newest,
        Self::Oldest,
        Self::Name,
        Self::RatingHigh,
        Self::RatingLow,
        Self::Cooked,
        Self::NotCooked,
        Self::Category,
    ];

    /// Wire name of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Name => "name",
            Self::RatingHigh => "rating-high",
            Self::RatingLow => "rating-low",
            Self::Cooked => "cooked",
            Self::NotCooked => "not-cooked",
            Self::Category => "category",
        }
    }

    /// Parses a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == s)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown sort key: {s}"))
    }
}

/// Which recipes are shown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    /// Every recipe.
    #[default]
    All,
    /// Only recipes whose category equals this exact string.
    Category(String),
}

impl CategoryFilter {
    /// Wire value meaning "no filter".
    pub const ALL_VALUE: &'static str = "all";

    /// Whether a recipe passes the filter.
    pub fn matches(&self, recipe: &Recipe) -> bool {
        match self {
            Self::All => true,
            Self::Category(category) => recipe.category.as_deref() == Some(category.as_str()),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(Self::ALL_VALUE),
            Self::Category(category) => f.write_str(category),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == Self::ALL_VALUE {
            Self::All
        } else {
            Self::Category(s.to_string())
        })
    }
}

/// A recipe as shown in the list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeCard {
    pub id: RecipeId,
    pub name: String,
    pub url: String,
    pub category: Option<String>,
    pub rating: Rating,
    pub filled_stars: u8,
    pub empty_stars: u8,
    pub cooked: bool,
    pub log_count: usize,
    pub author: Option<String>,
}

impl RecipeCard {
    /// Builds the card for one recipe.
    pub fn from_recipe(recipe: &Recipe) -> Self {
        let (filled_stars, empty_stars) = recipe.rating.stars();
        Self {
            id: recipe.id.clone(),
            name: recipe.name.clone(),
            url: recipe.url.clone(),
            category: recipe.category.clone(),
            rating: recipe.rating,
            filled_stars,
            empty_stars,
            cooked: recipe.cooked,
            log_count: recipe.logs.len(),
            author: recipe.created_by_name.clone(),
        }
    }

    /// Category to display, or `uncategorized` when there is none.
    pub fn category_label<'a>(&'a self, uncategorized: &'a str) -> &'a str {
        self.category.as_deref().unwrap_or(uncategorized)
    }
}

/// Result of projecting the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    /// Sorted, filtered records.
    pub cards: Vec<RecipeCard>,
    /// Size of the unfiltered collection.
    pub total_count: usize,
    /// Cooked recipes in the unfiltered collection.
    pub cooked_count: usize,
    /// Candidate categories for selection and filtering.
    pub categories: Vec<String>,
}

impl Projection {
    /// Whether nothing passed the filter.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Projects the collection for display.
///
/// Counts and the category list always describe the whole collection,
/// regardless of the filter.
pub fn project(recipes: &[Recipe], sort: SortKey, filter: &CategoryFilter) -> Projection {
    let cards = sort_recipes(recipes, sort)
        .into_iter()
        .filter(|r| filter.matches(r))
        .map(RecipeCard::from_recipe)
        .collect();

    Projection {
        cards,
        total_count: recipes.len(),
        cooked_count: recipes.iter().filter(|r| r.cooked).count(),
        categories: derive_categories(recipes),
    }
}

/// Returns the recipes in the requested order. Ties keep their delivered
/// order.
pub fn sort_recipes(recipes: &[Recipe], sort: SortKey) -> Vec<&Recipe> {
    let mut sorted: Vec<&Recipe> = recipes.iter().collect();
    match sort {
        SortKey::Newest => {}
        SortKey::Oldest => sorted.reverse(),
        SortKey::Name => sorted.sort_by(|a, b| locale_cmp(&a.name, &b.name)),
        SortKey::RatingHigh => sorted.sort_by(|a, b| b.rating.cmp(&a.rating)),
        SortKey::RatingLow => sorted.sort_by(|a, b| a.rating.cmp(&b.rating)),
        SortKey::Cooked => sorted.sort_by_key(|r| !r.cooked),
        SortKey::NotCooked => sorted.sort_by_key(|r| r.cooked),
        SortKey::Category => sorted.sort_by(|a, b| category_cmp(&a.category, &b.category)),
    }
    sorted
}

/// Deduplicated categories across the collection, in locale order.
pub fn derive_categories(recipes: &[Recipe]) -> Vec<String> {
    let mut categories: Vec<String> = recipes
        .iter()
        .filter_map(|r| r.category.clone())
        .collect();
    categories.sort_by(|a, b| locale_cmp(a, b));
    categories.dedup();
    categories
}

/// Locale-aware comparison: compatibility-normalized, case-folded text first,
/// then the raw strings so the order stays total.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn collation_key(s: &str) -> String {
    s.nfkc().flat_map(char::to_lowercase).collect()
}

fn category_cmp(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => locale_cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use entities::RecipeDraft;

    use super::*;

    fn recipe(name: &str, category: Option<&str>, rating: u8, cooked: bool) -> Recipe {
        let mut draft = RecipeDraft::new(name, format!("https://example.com/{name}"));
        if let Some(category) = category {
            draft = draft.with_category(category);
        }
        let mut recipe = draft
            .validate(Utc::now(), None)
            .unwrap()
            .into_recipe(RecipeId::new(name));
        recipe.rating = Rating::new(rating).unwrap();
        recipe.cooked = cooked;
        recipe
    }

    fn names(projection: &Projection) -> Vec<&str> {
        projection.cards.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_rating_and_name_scenario() {
        let recipes = vec![recipe("A", None, 2, false), recipe("B", None, 5, true)];

        let projection = project(&recipes, SortKey::RatingHigh, &CategoryFilter::All);
        assert_eq!(names(&projection), vec!["B", "A"]);

        let projection = project(&recipes, SortKey::Name, &CategoryFilter::All);
        assert_eq!(names(&projection), vec!["A", "B"]);

        let filter = CategoryFilter::Category("Dessert".into());
        let projection = project(&recipes, SortKey::Newest, &filter);
        assert!(projection.is_empty());
        assert_eq!(projection.total_count, 2);
        assert_eq!(projection.cooked_count, 1);
    }

    #[test]
    fn test_newest_and_oldest() {
        let recipes = vec![
            recipe("c", None, 0, false),
            recipe("b", None, 0, false),
            recipe("a", None, 0, false),
        ];
        let newest = project(&recipes, SortKey::Newest, &CategoryFilter::All);
        assert_eq!(names(&newest), vec!["c", "b", "a"]);
        let oldest = project(&recipes, SortKey::Oldest, &CategoryFilter::All);
        assert_eq!(names(&oldest), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cooked_partition_is_stable() {
        let recipes = vec![
            recipe("1", None, 0, false),
            recipe("2", None, 0, true),
            recipe("3", None, 0, false),
            recipe("4", None, 0, true),
        ];
        let cooked = project(&recipes, SortKey::Cooked, &CategoryFilter::All);
        assert_eq!(names(&cooked), vec!["2", "4", "1", "3"]);
        let not_cooked = project(&recipes, SortKey::NotCooked, &CategoryFilter::All);
        assert_eq!(names(&not_cooked), vec!["1", "3", "2", "4"]);
    }

    #[test]
    fn test_rating_ties_keep_delivered_order() {
        let recipes = vec![
            recipe("x", None, 3, false),
            recipe("y", None, 5, false),
            recipe("z", None, 3, false),
        ];
        let low = project(&recipes, SortKey::RatingLow, &CategoryFilter::All);
        assert_eq!(names(&low), vec!["x", "z", "y"]);
    }

    #[test]
    fn test_uncategorized_sorts_last() {
        let recipes = vec![
            recipe("none-1", None, 0, false),
            recipe("zzzz", Some("zzzz"), 0, false),
            recipe("dessert", Some("Dessert"), 0, false),
            recipe("none-2", None, 0, false),
            recipe("bread", Some("bread"), 0, false),
        ];
        let projection = project(&recipes, SortKey::Category, &CategoryFilter::All);
        assert_eq!(
            names(&projection),
            vec!["bread", "dessert", "zzzz", "none-1", "none-2"]
        );
    }

    #[test]
    fn test_projection_is_deterministic() {
        let recipes = vec![
            recipe("Udon", Some("Noodles"), 4, true),
            recipe("udon", Some("noodles"), 4, false),
            recipe("Ramen", None, 1, false),
        ];
        for sort in SortKey::ALL {
            let first = project(&recipes, sort, &CategoryFilter::All);
            let second = project(&recipes, sort, &CategoryFilter::All);
            assert_eq!(first, second, "sort {sort} is not deterministic");
        }
    }

    #[test]
    fn test_filter_is_exact_and_case_sensitive() {
        let recipes = vec![
            recipe("a", Some("Dessert"), 0, false),
            recipe("b", Some("dessert"), 0, false),
            recipe("c", Some("Desserts"), 0, false),
        ];
        let filter: CategoryFilter = "Dessert".parse().unwrap();
        let projection = project(&recipes, SortKey::Newest, &filter);
        assert_eq!(names(&projection), vec!["a"]);
    }

    #[test]
    fn test_categories_are_deduplicated_and_sorted() {
        let recipes = vec![
            recipe("a", Some("Soup"), 0, false),
            recipe("b", None, 0, false),
            recipe("c", Some("bread"), 0, false),
            recipe("d", Some("Soup"), 0, false),
        ];
        assert_eq!(derive_categories(&recipes), vec!["bread", "Soup"]);
    }

    #[test]
    fn test_locale_cmp_folds_width_and_case() {
        assert_eq!(locale_cmp("ａｐｐｌｅ", "Banana"), Ordering::Less);
        assert_eq!(locale_cmp("apple", "Apple"), Ordering::Greater);
        assert_eq!(locale_cmp("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_card_fields() {
        let mut source = recipe("Curry", None, 3, true);
        source.created_by_name = Some("Hanako".into());
        let projection = project(&[source], SortKey::Newest, &CategoryFilter::All);
        let card = &projection.cards[0];

        assert_eq!((card.filled_stars, card.empty_stars), (3, 2));
        assert_eq!(card.category_label("Uncategorized"), "Uncategorized");
        assert_eq!(card.author.as_deref(), Some("Hanako"));
        assert_eq!(card.log_count, 0);
    }

    #[test]
    fn test_sort_key_wire_names() {
        for key in SortKey::ALL {
            assert_eq!(SortKey::parse(key.as_str()), Some(key));
        }
        assert!("popular".parse::<SortKey>().is_err());
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
    }
}
