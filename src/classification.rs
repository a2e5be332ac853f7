//! Classification Engine for energy-potential scores
//!
//! Maps continuous 0-10 potential scores onto discrete categories and
//! user-facing advisories. Categories are never stored: they are recomputed
//! from the score every time they are needed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{RegionRecord, SiteRecord};

/// Default terrain slope limit in degrees
pub const DEFAULT_SLOPE_LIMIT_DEG: f64 = 15.0;

/// Advisory shown when terrain is too steep, regardless of score
pub const UNSUITABLE_TERRAIN_ADVISORY: &str =
    "Site unsuitable: terrain slope exceeds the safe installation limit. Choose flatter ground.";

/// Classification band of a potential score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// [0, 2)
    Lowest,
    /// [2, 4)
    Low,
    /// [4, 6)
    Moderate,
    /// [6, 8)
    High,
    /// [8, ∞)
    Highest,
}

impl Category {
    /// Ordinal rank, 0 for `Lowest` through 4 for `Highest`
    #[must_use]
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Category::Lowest => "Very Low",
            Category::Low => "Low",
            Category::Moderate => "Moderate",
            Category::High => "High",
            Category::Highest => "Very High",
        }
    }

    #[must_use]
    pub fn advisory(&self) -> &'static str {
        match self {
            Category::Lowest => {
                "Very low potential. Installation is not recommended at this location."
            }
            Category::Low => {
                "Low potential. Only small, low-demand systems are viable; consider a hybrid supply."
            }
            Category::Moderate => {
                "Moderate potential. Suitable for community-scale systems with adequate storage."
            }
            Category::High => "High potential. Well suited for productive-use installations.",
            Category::Highest => {
                "Excellent potential. Priority site for large-scale deployment."
            }
        }
    }

    /// Map legend color
    #[must_use]
    pub fn color(&self) -> &'static str {
        match self {
            Category::Lowest => "#d7191c",
            Category::Low => "#fdae61",
            Category::Moderate => "#ffffbf",
            Category::High => "#a6d96a",
            Category::Highest => "#1a9641",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a score using half-open bands with inclusive lower bounds.
///
/// Scores outside 0-10 are not clamped; NaN falls in the lowest band.
#[must_use]
pub fn classify(score: f64) -> Category {
    if score >= 8.0 {
        Category::Highest
    } else if score >= 6.0 {
        Category::High
    } else if score >= 4.0 {
        Category::Moderate
    } else if score >= 2.0 {
        Category::Low
    } else {
        Category::Lowest
    }
}

/// Category plus the advisory text to display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub category: Category,
    pub message: String,
    pub color: String,
    /// Slope gate overrode the score-based message
    pub unsuitable_terrain: bool,
}

/// Build the advisory for a score, applying the slope gate
#[must_use]
pub fn advise(score: f64, slope_deg: Option<f64>, slope_limit_deg: f64) -> Advisory {
    let category = classify(score);
    let unsuitable_terrain = slope_deg.is_some_and(|slope| slope > slope_limit_deg);
    let message = if unsuitable_terrain {
        UNSUITABLE_TERRAIN_ADVISORY
    } else {
        category.advisory()
    };

    Advisory {
        category,
        message: message.to_string(),
        color: category.color().to_string(),
        unsuitable_terrain,
    }
}

/// Energy resource being assessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Solar,
    Wind,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Solar => f.write_str("Solar"),
            Resource::Wind => f.write_str("Wind"),
        }
    }
}

/// Levelized cost of energy in USD/kWh, rounded to 3 decimals
#[must_use]
pub fn estimate_lcoe(resource: Resource, score: f64) -> f64 {
    let lcoe = match resource {
        Resource::Solar => 0.15 - score * 0.005,
        Resource::Wind => 0.12 - score * 0.004,
    };
    (lcoe * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAssessment {
    pub resource: Resource,
    pub score: f64,
    pub advisory: Advisory,
}

/// Solar and wind assessments of one record; a resource without a score is `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteAssessment {
    pub solar: Option<ResourceAssessment>,
    pub wind: Option<ResourceAssessment>,
}

impl SiteAssessment {
    /// Assess a site record, gating on its sampled slope
    #[must_use]
    pub fn of(record: &SiteRecord, slope_limit_deg: f64) -> Self {
        let slope = record.metrics.slope;
        let assess = |resource, score: Option<f64>| {
            score.map(|score| ResourceAssessment {
                resource,
                score,
                advisory: advise(score, slope, slope_limit_deg),
            })
        };

        Self {
            solar: assess(Resource::Solar, record.metrics.solar_score),
            wind: assess(Resource::Wind, record.metrics.wind_score),
        }
    }

    /// Assess regional mean scores; regions carry no slope
    #[must_use]
    pub fn of_region(record: &RegionRecord) -> Self {
        let assess = |resource, score: Option<f64>| {
            score.map(|score| ResourceAssessment {
                resource,
                score,
                advisory: advise(score, None, DEFAULT_SLOPE_LIMIT_DEG),
            })
        };

        Self {
            solar: assess(Resource::Solar, record.metrics.solar_mean_score),
            wind: assess(Resource::Wind, record.metrics.wind_mean_score),
        }
    }

    /// Resource with the higher score, if any was scored
    #[must_use]
    pub fn preferred(&self) -> Option<&ResourceAssessment> {
        [self.solar.as_ref(), self.wind.as_ref()]
            .into_iter()
            .flatten()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_boundaries() {
        assert_eq!(classify(0.0), Category::Lowest);
        assert_eq!(classify(1.999), Category::Lowest);
        assert_eq!(classify(2.0), Category::Low);
        assert_eq!(classify(3.999), Category::Low);
        assert_eq!(classify(4.0), Category::Moderate);
        assert_eq!(classify(6.0), Category::High);
        assert_eq!(classify(7.999), Category::High);
        assert_eq!(classify(8.0), Category::Highest);
        assert_eq!(classify(10.0), Category::Highest);
    }

    #[test]
    fn test_out_of_range_scores_are_not_clamped() {
        assert_eq!(classify(-3.0), Category::Lowest);
        assert_eq!(classify(14.2), Category::Highest);
        assert_eq!(classify(f64::NAN), Category::Lowest);
    }

    #[test]
    fn test_classify_is_monotonic() {
        let mut previous = classify(-1.0).rank();
        let mut score = -1.0;
        while score <= 11.0 {
            let rank = classify(score).rank();
            assert!(rank >= previous, "rank dropped at {score}");
            previous = rank;
            score += 0.01;
        }
    }

    #[test]
    fn test_steep_slope_overrides_any_score() {
        for score in [0.5, 3.0, 5.0, 7.0, 9.5] {
            let advisory = advise(score, Some(15.1), DEFAULT_SLOPE_LIMIT_DEG);
            assert!(advisory.unsuitable_terrain);
            assert_eq!(advisory.message, UNSUITABLE_TERRAIN_ADVISORY);
            assert_eq!(advisory.category, classify(score));
        }
    }

    #[test]
    fn test_slope_at_limit_keeps_score_advisory() {
        let advisory = advise(9.0, Some(15.0), DEFAULT_SLOPE_LIMIT_DEG);
        assert!(!advisory.unsuitable_terrain);
        assert_eq!(advisory.message, Category::Highest.advisory());

        let no_slope = advise(9.0, None, DEFAULT_SLOPE_LIMIT_DEG);
        assert!(!no_slope.unsuitable_terrain);
    }

    #[test]
    fn test_lcoe_estimate() {
        assert_eq!(estimate_lcoe(Resource::Solar, 8.0), 0.11);
        assert_eq!(estimate_lcoe(Resource::Wind, 5.0), 0.1);
        assert_eq!(estimate_lcoe(Resource::Solar, 7.2), 0.114);
    }
}
