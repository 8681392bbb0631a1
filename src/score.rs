//! Rank-difference scoring.
//!
//! For each weighted category the side with the numerically lower (better)
//! rank earns one point, but only when the two ranks are further apart than
//! the category's weight. Categories where either side is unavailable earn
//! nothing and are left out of the breakdown.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info};

use crate::extract::{normalize_category, Rank, RankMap};

/// Category → minimum rank difference needed to award a point.
/// Keys are normalized on construction; iteration follows insertion order,
/// which is the order of the per-category breakdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringCriteria {
    weights: Vec<(String, f64)>,
}

impl ScoringCriteria {
    /// A repeated (normalized) key keeps its first position and the last weight.
    pub fn new<I, K>(weights: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut out = Self::default();
        for (k, w) in weights {
            out.insert(normalize_category(k.as_ref()), w);
        }
        out
    }

    fn insert(&mut self, key: String, weight: f64) {
        match self.weights.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = weight,
            None => self.weights.push((key, weight)),
        }
    }

    /// Reorder to follow `categories`; criteria not named there keep their
    /// relative order at the end.
    pub fn ordered_by<S: AsRef<str>>(&self, categories: &[S]) -> Self {
        let mut out = Self::default();
        for c in categories {
            let key = normalize_category(c.as_ref());
            if let Some(w) = self.weight(&key) {
                out.insert(key, w);
            }
        }
        for (k, w) in &self.weights {
            if out.weight(k).is_none() {
                out.insert(k.clone(), *w);
            }
        }
        out
    }

    pub fn weight(&self, category: &str) -> Option<f64> {
        let key = normalize_category(category);
        self.weights.iter().find(|(k, _)| *k == key).map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, w)| (k.as_str(), *w))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.weights.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl Serialize for ScoringCriteria {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for ScoringCriteria {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CriteriaVisitor;

        impl<'de> Visitor<'de> for CriteriaVisitor {
            type Value = ScoringCriteria;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of category to weight")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out = ScoringCriteria::default();
                while let Some((k, w)) = map.next_entry::<String, f64>()? {
                    out.insert(normalize_category(&k), w);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(CriteriaVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointAward {
    Home,
    Away,
    None,
}

/// Projected outcome. A zero delta is an explicit tie, never a default side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Home,
    Away,
    Tie,
}

impl Winner {
    pub fn from_delta(delta: i32) -> Self {
        match delta {
            d if d > 0 => Winner::Home,
            d if d < 0 => Winner::Away,
            _ => Winner::Tie,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub home_rank: Rank,
    pub away_rank: Rank,
    pub weight: f64,
    pub point_awarded_to: PointAward,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    /// `home_points - away_points`; positive favors home.
    pub delta: i32,
    pub home_points: u32,
    pub away_points: u32,
    pub per_category: Vec<CategoryScore>,
}

impl ScoreOutcome {
    pub fn winner(&self) -> Winner {
        Winner::from_delta(self.delta)
    }
}

pub fn score(home_ranks: &RankMap, away_ranks: &RankMap, criteria: &ScoringCriteria) -> ScoreOutcome {
    info!(home = ?home_ranks, away = ?away_ranks, "calculating score");
    let home = normalized(home_ranks);
    let away = normalized(away_ranks);

    let mut home_points = 0u32;
    let mut away_points = 0u32;
    let mut per_category = Vec::with_capacity(criteria.len());

    for (category, weight) in criteria.iter() {
        let (Some(&h), Some(&a)) = (home.get(category), away.get(category)) else {
            debug!(%category, "rank missing on one side, skipped");
            continue;
        };
        let (Some(hr), Some(ar)) = (h.position(), a.position()) else {
            debug!(%category, "rank unavailable on one side, skipped");
            continue;
        };

        let difference = hr.abs_diff(ar);
        let point_awarded_to = if f64::from(difference) > weight {
            match hr.cmp(&ar) {
                std::cmp::Ordering::Less => PointAward::Home,
                std::cmp::Ordering::Greater => PointAward::Away,
                std::cmp::Ordering::Equal => PointAward::None,
            }
        } else {
            PointAward::None
        };
        match point_awarded_to {
            PointAward::Home => home_points += 1,
            PointAward::Away => away_points += 1,
            PointAward::None => {}
        }
        debug!(%category, difference, weight, awarded = ?point_awarded_to, "category scored");

        per_category.push(CategoryScore {
            category: category.to_string(),
            home_rank: h,
            away_rank: a,
            weight,
            point_awarded_to,
        });
    }

    let delta = home_points as i32 - away_points as i32;
    info!(delta, home_points, away_points, "score calculated");
    ScoreOutcome {
        delta,
        home_points,
        away_points,
        per_category,
    }
}

fn normalized(ranks: &RankMap) -> RankMap {
    ranks
        .iter()
        .map(|(k, v)| (normalize_category(k), *v))
        .collect()
}
