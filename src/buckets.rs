use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsDimension {
    HomeOdd,
    Over25Odd,
}

impl OddsDimension {
    pub fn as_str(self) -> &'static str {
        match self {
            OddsDimension::HomeOdd => "home_odd",
            OddsDimension::Over25Odd => "over25_odd",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" | "home_odd" => Some(OddsDimension::HomeOdd),
            "over25" | "over25_odd" => Some(OddsDimension::Over25Odd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRange {
    pub min: f64,
    /// `None` means unbounded above.
    #[serde(default)]
    pub max: Option<f64>,
    pub label: String,
}

impl BucketRange {
    fn new(min: f64, max: Option<f64>, label: &str) -> Self {
        Self {
            min,
            max,
            label: label.to_string(),
        }
    }

    pub fn contains(&self, odd: f64) -> bool {
        odd >= self.min && self.max.is_none_or(|max| odd <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionBuckets {
    pub ranges: Vec<BucketRange>,
    pub fallback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub home_odd: DimensionBuckets,
    pub over25_odd: DimensionBuckets,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            home_odd: DimensionBuckets {
                ranges: vec![
                    BucketRange::new(1.20, Some(1.40), "1.20-1.40"),
                    BucketRange::new(1.41, Some(1.70), "1.41-1.70"),
                    BucketRange::new(1.71, Some(2.20), "1.71-2.20"),
                    BucketRange::new(2.21, None, "2.21+"),
                ],
                fallback: "2.21+".to_string(),
            },
            over25_odd: DimensionBuckets {
                ranges: vec![
                    BucketRange::new(1.00, Some(1.40), "1.00-1.40"),
                    BucketRange::new(1.41, Some(1.60), "1.41-1.60"),
                    BucketRange::new(1.61, Some(1.80), "1.61-1.80"),
                    BucketRange::new(1.81, None, "1.81+"),
                ],
                fallback: "1.81+".to_string(),
            },
        }
    }
}

impl BucketConfig {
    pub fn dimension(&self, dimension: OddsDimension) -> &DimensionBuckets {
        match dimension {
            OddsDimension::HomeOdd => &self.home_odd,
            OddsDimension::Over25Odd => &self.over25_odd,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read bucket config {}", path.display()))?;
        let config: BucketConfig =
            serde_json::from_str(&raw).context("invalid bucket config json")?;
        config.validate()?;
        Ok(config)
    }

    /// Ranges must be well formed, sorted ascending and non-overlapping.
    pub fn validate(&self) -> Result<()> {
        for dimension in [OddsDimension::HomeOdd, OddsDimension::Over25Odd] {
            let buckets = self.dimension(dimension);
            let name = dimension.as_str();
            if buckets.fallback.trim().is_empty() {
                return Err(anyhow!("{name}: fallback label is empty"));
            }
            let mut prev_max: Option<f64> = None;
            for (idx, range) in buckets.ranges.iter().enumerate() {
                if range.label.trim().is_empty() {
                    return Err(anyhow!("{name}: range {idx} has an empty label"));
                }
                if !range.min.is_finite() || range.max.is_some_and(|max| max < range.min) {
                    return Err(anyhow!("{name}: range {} has min > max", range.label));
                }
                if idx > 0 {
                    let Some(prev) = prev_max else {
                        return Err(anyhow!(
                            "{name}: range {} follows an unbounded range",
                            range.label
                        ));
                    };
                    if range.min <= prev {
                        return Err(anyhow!(
                            "{name}: range {} overlaps or is out of order",
                            range.label
                        ));
                    }
                }
                prev_max = range.max;
            }
        }
        Ok(())
    }
}

/// Label of the first range containing `odd`, or the dimension's fallback.
pub fn classify<'a>(odd: f64, dimension: OddsDimension, config: &'a BucketConfig) -> &'a str {
    let buckets = config.dimension(dimension);
    buckets
        .ranges
        .iter()
        .find(|range| range.contains(odd))
        .map(|range| range.label.as_str())
        .unwrap_or(buckets.fallback.as_str())
}

pub fn pattern_hash(home_bucket: &str, over25_bucket: &str) -> String {
    format!("{home_bucket}_{over25_bucket}")
}
