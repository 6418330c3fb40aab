use serde::{Deserialize, Serialize};
use std::fmt;

/// Competition formats a competitor is rated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ones,
    Twos,
    Threes,
    Fours,
}

impl Category {
    /// All categories in canonical order
    pub const ALL: [Category; 4] = [
        Category::Ones,
        Category::Twos,
        Category::Threes,
        Category::Fours,
    ];

    /// Formula variable bound to this category's current rating
    pub fn rating_variable(&self) -> &'static str {
        match self {
            Category::Ones => "ones",
            Category::Twos => "twos",
            Category::Threes => "threes",
            Category::Fours => "fours",
        }
    }

    /// Formula variable bound to this category's games-played count
    pub fn games_variable(&self) -> &'static str {
        match self {
            Category::Ones => "onesGames",
            Category::Twos => "twosGames",
            Category::Threes => "threesGames",
            Category::Fours => "foursGames",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rating_variable())
    }
}

/// One value per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct PerCategory<T> {
    pub ones: T,
    pub twos: T,
    pub threes: T,
    pub fours: T,
}

impl<T> PerCategory<T> {
    pub fn new(ones: T, twos: T, threes: T, fours: T) -> Self {
        Self {
            ones,
            twos,
            threes,
            fours,
        }
    }

    pub fn get(&self, category: Category) -> &T {
        match category {
            Category::Ones => &self.ones,
            Category::Twos => &self.twos,
            Category::Threes => &self.threes,
            Category::Fours => &self.fours,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut T {
        match category {
            Category::Ones => &mut self.ones,
            Category::Twos => &mut self.twos,
            Category::Threes => &mut self.threes,
            Category::Fours => &mut self.fours,
        }
    }

    /// Iterate `(category, value)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// Statistics recorded for a single category.
///
/// Every field is independently optional: `None` means "no data", never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryStats {
    /// Current rating
    pub rating: Option<f64>,

    /// Number of games played
    pub games_played: Option<u32>,

    /// Highest rating reached
    pub peak_rating: Option<f64>,
}

impl CategoryStats {
    pub fn new(rating: Option<f64>, games_played: Option<u32>, peak_rating: Option<f64>) -> Self {
        Self {
            rating,
            games_played,
            peak_rating,
        }
    }

    /// Games played, with missing data counted as zero
    pub fn games_or_zero(&self) -> u32 {
        self.games_played.unwrap_or(0)
    }
}

/// Per-category statistics for one competitor
pub type PerCategoryStats = PerCategory<CategoryStats>;

impl PerCategoryStats {
    /// Build stats from ratings and games-played counts, without peak data
    pub fn from_ratings(ratings: [f64; 4], games: [u32; 4]) -> Self {
        let stat = |i: usize| CategoryStats::new(Some(ratings[i]), Some(games[i]), None);
        Self::new(stat(0), stat(1), stat(2), stat(3))
    }

    /// Sum of games played across all four categories, missing counts as zero
    pub fn total_games(&self) -> u64 {
        self.iter().map(|(_, s)| u64::from(s.games_or_zero())).sum()
    }

    /// The fixed dataset formulas are tested against when no stats are supplied.
    ///
    /// These values are shared with formula validation and must not change.
    pub fn sample() -> Self {
        Self::from_ratings([1200.0, 1400.0, 1600.0, 1000.0], [150, 300, 500, 50])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_variables() {
        assert_eq!(Category::Ones.rating_variable(), "ones");
        assert_eq!(Category::Threes.games_variable(), "threesGames");
        assert_eq!(Category::Fours.to_string(), "fours");
    }

    #[test]
    fn test_sample_dataset() {
        let sample = PerCategoryStats::sample();
        assert_eq!(sample.ones.rating, Some(1200.0));
        assert_eq!(sample.twos.rating, Some(1400.0));
        assert_eq!(sample.threes.games_played, Some(500));
        assert_eq!(sample.fours.games_played, Some(50));
        assert!(sample.iter().all(|(_, s)| s.peak_rating.is_none()));
        assert_eq!(sample.total_games(), 1000);
    }

    #[test]
    fn test_total_games_treats_missing_as_zero() {
        let mut stats = PerCategoryStats::default();
        assert_eq!(stats.total_games(), 0);

        stats.twos.games_played = Some(12);
        stats.fours.rating = Some(900.0);
        assert_eq!(stats.total_games(), 12);
    }

    #[test]
    fn test_stats_deserialize_with_missing_fields() {
        let json = r#"{ "twos": { "rating": 1400.0, "games_played": 30 } }"#;
        let stats: PerCategoryStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.twos.rating, Some(1400.0));
        assert_eq!(stats.ones, CategoryStats::default());
        assert_eq!(stats.twos.peak_rating, None);
    }
}
