use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Overlap between the years a vehicle was built and the years a part fits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityReport {
    pub compatible_years: Vec<i32>,
    /// Vehicle years the part does not cover.
    pub vehicle_only_years: Vec<i32>,
    /// Part years outside the vehicle's production span.
    pub part_only_years: Vec<i32>,
    /// `|compatible| / |vehicle|`, 0 when the vehicle list is empty.
    pub compatibility_ratio: f64,
    pub is_fully_compatible: bool,
    pub has_extra_coverage: bool,
}

impl CompatibilityReport {
    pub fn new(vehicle_years: &[i32], part_years: &[i32]) -> Self {
        let vehicle: BTreeSet<i32> = vehicle_years.iter().copied().collect();
        let part: BTreeSet<i32> = part_years.iter().copied().collect();

        let compatible_years: Vec<i32> = vehicle.intersection(&part).copied().collect();
        let vehicle_only_years: Vec<i32> = vehicle.difference(&part).copied().collect();
        let part_only_years: Vec<i32> = part.difference(&vehicle).copied().collect();

        let compatibility_ratio = if vehicle.is_empty() {
            0.0
        } else {
            compatible_years.len() as f64 / vehicle.len() as f64
        };

        Self {
            is_fully_compatible: vehicle_only_years.is_empty(),
            has_extra_coverage: !part_only_years.is_empty(),
            compatible_years,
            vehicle_only_years,
            part_only_years,
            compatibility_ratio,
        }
    }
}

/// Years falling in one decade, e.g. the `"2010s"` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecadeBucket {
    pub decade_start: i32,
    pub years: Vec<i32>,
    pub count: usize,
    pub min: i32,
    pub max: i32,
}

/// Group years by decade. Keys are labels like `"1990s"`; duplicates are
/// kept and counted.
pub fn decade_summary(years: &[i32]) -> BTreeMap<String, DecadeBucket> {
    let mut buckets: BTreeMap<String, DecadeBucket> = BTreeMap::new();
    for &year in years {
        let decade_start = year.div_euclid(10) * 10;
        let bucket = buckets
            .entry(format!("{decade_start}s"))
            .or_insert_with(|| DecadeBucket {
                decade_start,
                years: Vec::new(),
                count: 0,
                min: year,
                max: year,
            });
        bucket.years.push(year);
        bucket.count += 1;
        bucket.min = bucket.min.min(year);
        bucket.max = bucket.max.max(year);
    }
    for bucket in buckets.values_mut() {
        bucket.years.sort_unstable();
    }
    buckets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub cached_entries: usize,
    /// Rough byte count of keys and cached ranges.
    pub memory_estimate: usize,
}
