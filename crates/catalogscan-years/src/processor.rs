use catalogscan_core::VendorType;
use chrono::Datelike;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::range::{YearFormat, YearRange};
use crate::summary::{CacheStats, CompatibilityReport};

/// Earliest model year accepted (Benz Patent-Motorwagen).
pub const MIN_AUTOMOTIVE_YEAR: i32 = 1885;
/// How far past the current year a model year may reach.
pub const FUTURE_YEAR_MARGIN: i32 = 5;
/// Two-digit years up to this value belong to the 2000s.
pub const CENTURY_PIVOT: i32 = 29;

// Digits are ASCII only so that matching agrees with `str::parse`.
static FULL_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19[0-9]{2}|20[0-9]{2})\b").unwrap());

static SHORT_SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'?([0-9]{2})\b").unwrap());

static RANGE_FULL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(19[0-9]{2}|20[0-9]{2})\s*[-~/]\s*(19[0-9]{2}|20[0-9]{2})\b").unwrap()
});

static RANGE_SHORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'?([0-9]{2})\s*[-~/]\s*'?([0-9]{2})\b").unwrap());

static RANGE_MIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'?([0-9]{2})\s*[-~/]\s*(19[0-9]{2}|20[0-9]{2})\b").unwrap());

static LIST_COMMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(?:19|20)[0-9]{2}|'?[0-9]{2})(?:\s*,\s*(?:(?:19|20)[0-9]{2}|'?[0-9]{2}))+\b")
        .unwrap()
});

// Vendor wrappers: the capture is the year expression inside the vendor's
// usual framing.
static DEPO_WRAPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\[(]\s*([0-9\-~,'\s]+)\s*[\])]").unwrap());

static YUTO_WRAPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9\-~,'\s]+)(?:\s+type|\s+model|\s+year)").unwrap());

static HUSHAN_WRAPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:year|yr|model)\s*:?\s*([0-9\-~,'\s]+)").unwrap());

fn vendor_wrapper(vendor: VendorType) -> Option<&'static Regex> {
    match vendor {
        VendorType::Depo => Some(&*DEPO_WRAPPER),
        VendorType::Yuto => Some(&*YUTO_WRAPPER),
        VendorType::Hushan => Some(&*HUSHAN_WRAPPER),
        VendorType::Generic | VendorType::Unknown => None,
    }
}

type CacheKey = (String, Option<VendorType>);

/// Turns free-text model-year expressions into canonical year ranges.
///
/// Results of [`extract_years_from_text`](Self::extract_years_from_text) are
/// memoized per `(text, vendor hint)` in a concurrent map, so one processor
/// can be shared across worker threads. The cache has no eviction; call
/// [`clear_cache`](Self::clear_cache) between batches when memory matters.
pub struct YearProcessor {
    current_year: i32,
    max_year: i32,
    cache: DashMap<CacheKey, Vec<YearRange>>,
}

impl Default for YearProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl YearProcessor {
    pub fn new() -> Self {
        Self::with_current_year(chrono::Local::now().year())
    }

    /// Pin the clock, e.g. for reproducible tests.
    pub fn with_current_year(current_year: i32) -> Self {
        Self {
            current_year,
            max_year: current_year + FUTURE_YEAR_MARGIN,
            cache: DashMap::new(),
        }
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn max_year(&self) -> i32 {
        self.max_year
    }

    /// `00..=29` map to the 2000s, `30..=99` to the 1900s.
    pub fn convert_short_year(&self, short_year: i32) -> i32 {
        convert_short_year(short_year)
    }

    pub fn is_valid_year(&self, year: i32) -> bool {
        (MIN_AUTOMOTIVE_YEAR..=self.max_year).contains(&year)
    }

    /// Classify the first year shape found in `text`.
    ///
    /// Patterns overlap (a full range also contains short-range substrings),
    /// so they are tried from most to least specific.
    pub fn detect_year_format(&self, text: &str) -> YearFormat {
        let text = text.trim();
        if RANGE_FULL.is_match(text) {
            YearFormat::RangeFull
        } else if RANGE_MIXED.is_match(text) {
            YearFormat::RangeMixed
        } else if RANGE_SHORT.is_match(text) {
            YearFormat::RangeShort
        } else if LIST_COMMA.is_match(text) {
            YearFormat::ListMixed
        } else if FULL_SINGLE.is_match(text) {
            YearFormat::FullYear
        } else if SHORT_SINGLE.is_match(text) {
            YearFormat::ShortYear
        } else {
            YearFormat::Invalid
        }
    }

    /// Parse one year token. Quotes and surrounding whitespace are ignored and
    /// two-digit values go through the century rule. Unparseable or
    /// out-of-range values are logged and dropped.
    pub fn parse_single_year(&self, text: &str) -> Option<i32> {
        let cleaned = text.trim().replace('\'', "");
        let mut year = match cleaned.trim().parse::<i32>() {
            Ok(y) => y,
            Err(_) => {
                tracing::warn!(text = %cleaned, "could not parse year");
                return None;
            }
        };

        if (0..=99).contains(&year) {
            year = convert_short_year(year);
        }

        if self.is_valid_year(year) {
            Some(year)
        } else {
            tracing::warn!(
                year,
                min = MIN_AUTOMOTIVE_YEAR,
                max = self.max_year,
                "year outside automotive range"
            );
            None
        }
    }

    /// Build a range from two endpoint tokens. The format tag reflects the
    /// endpoint widths: both two-digit is short, two then four is mixed, and
    /// anything else counts as full.
    pub fn parse_year_range(&self, start: &str, end: &str, original: &str) -> Option<YearRange> {
        let start_year = self.parse_single_year(start)?;
        let end_year = self.parse_single_year(end)?;

        let start_digits = start.replace('\'', "").len();
        let end_digits = end.replace('\'', "").len();
        let format = if start_digits == 2 && end_digits == 2 {
            YearFormat::RangeShort
        } else if start_digits == 2 && end.len() == 4 {
            YearFormat::RangeMixed
        } else {
            YearFormat::RangeFull
        };

        Some(YearRange::new(start_year, end_year, original, format))
    }

    /// Split a comma list into one degenerate range per valid element.
    pub fn parse_year_list(&self, text: &str) -> Vec<YearRange> {
        text.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| {
                let year = self.parse_single_year(part)?;
                let format = if part.replace('\'', "").len() == 4 {
                    YearFormat::FullYear
                } else {
                    YearFormat::ShortYear
                };
                Some(YearRange::single(year, part, format))
            })
            .collect()
    }

    /// Extract every year range from `text`.
    ///
    /// With a vendor hint, the vendor's wrapper pattern is tried first and each
    /// wrapped fragment is parsed without the hint; if that yields anything it
    /// wins outright. Otherwise the whole text is classified and parsed by
    /// format. Blank input returns an empty list and is not cached.
    pub fn extract_years_from_text(
        &self,
        text: &str,
        vendor_hint: Option<VendorType>,
    ) -> Vec<YearRange> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let key = (text.to_string(), vendor_hint);
        if let Some(cached) = self.cache.get(&key) {
            tracing::trace!(vendor = ?vendor_hint, "year cache hit");
            return cached.clone();
        }

        let trimmed = text.trim();

        if let Some(wrapper) = vendor_hint.and_then(vendor_wrapper) {
            let ranges: Vec<YearRange> = wrapper
                .captures_iter(trimmed)
                .filter_map(|caps| caps.get(1))
                .flat_map(|inner| self.extract_years_from_text(inner.as_str(), None))
                .collect();
            if !ranges.is_empty() {
                self.cache.insert(key, ranges.clone());
                return ranges;
            }
        }

        let ranges = self.parse_by_format(trimmed);
        self.cache.insert(key, ranges.clone());
        ranges
    }

    fn parse_by_format(&self, text: &str) -> Vec<YearRange> {
        let format = self.detect_year_format(text);
        match format {
            YearFormat::RangeFull | YearFormat::RangeMixed | YearFormat::RangeShort => {
                let re: &Regex = match format {
                    YearFormat::RangeFull => &*RANGE_FULL,
                    YearFormat::RangeMixed => &*RANGE_MIXED,
                    _ => &*RANGE_SHORT,
                };
                re.captures(text)
                    .and_then(|caps| self.parse_year_range(&caps[1], &caps[2], &caps[0]))
                    .into_iter()
                    .collect()
            }
            YearFormat::ListMixed => LIST_COMMA
                .find(text)
                .map(|m| self.parse_year_list(m.as_str()))
                .unwrap_or_default(),
            YearFormat::FullYear | YearFormat::ShortYear => {
                let re: &Regex = if format == YearFormat::FullYear {
                    &*FULL_SINGLE
                } else {
                    &*SHORT_SINGLE
                };
                re.captures_iter(text)
                    .filter_map(|caps| {
                        let token = caps.get(1)?.as_str();
                        let year = self.parse_single_year(token)?;
                        Some(YearRange::single(year, token, format))
                    })
                    .collect()
            }
            YearFormat::Invalid => Vec::new(),
        }
    }

    /// Sorted, deduplicated union of every year mentioned in `text`.
    pub fn expand_all_years(&self, text: &str, vendor_hint: Option<VendorType>) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .extract_years_from_text(text, vendor_hint)
            .iter()
            .flat_map(YearRange::expand)
            .collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    /// Merge overlapping or adjacent ranges. A one-year gap stays split.
    pub fn consolidate_ranges(&self, ranges: &[YearRange]) -> Vec<YearRange> {
        consolidate_ranges(ranges)
    }

    pub fn validate_year_compatibility(
        &self,
        vehicle_years: &[i32],
        part_years: &[i32],
    ) -> CompatibilityReport {
        CompatibilityReport::new(vehicle_years, part_years)
    }

    pub fn clear_cache(&self) -> usize {
        let n = self.cache.len();
        self.cache.clear();
        tracing::debug!(entries = n, "year cache cleared");
        n
    }

    pub fn cache_stats(&self) -> CacheStats {
        let memory_estimate = self
            .cache
            .iter()
            .map(|entry| {
                let (text, _) = entry.key();
                let payload: usize = entry
                    .value()
                    .iter()
                    .map(|r| std::mem::size_of::<YearRange>() + r.original_text.len())
                    .sum();
                text.len() + payload
            })
            .sum();
        CacheStats {
            cached_entries: self.cache.len(),
            memory_estimate,
        }
    }
}

/// `00..=29` map to the 2000s, `30..=99` to the 1900s.
pub fn convert_short_year(short_year: i32) -> i32 {
    if short_year <= CENTURY_PIVOT {
        2000 + short_year
    } else {
        1900 + short_year
    }
}

/// Merge overlapping or adjacent ranges after sorting by start year.
///
/// A merged range keeps the comma-joined source texts and is tagged
/// [`YearFormat::RangeFull`]; untouched ranges are returned as-is.
pub fn consolidate_ranges(ranges: &[YearRange]) -> Vec<YearRange> {
    let mut sorted = ranges.to_vec();
    sorted.sort_by_key(YearRange::start_year);

    let mut merged: Vec<YearRange> = Vec::with_capacity(sorted.len());
    for current in sorted {
        match merged.last_mut() {
            Some(last) if current.start_year() <= last.end_year().saturating_add(1) => {
                *last = YearRange::new(
                    last.start_year(),
                    last.end_year().max(current.end_year()),
                    format!("{}, {}", last.original_text, current.original_text),
                    YearFormat::RangeFull,
                );
            }
            _ => merged.push(current),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> YearProcessor {
        YearProcessor::with_current_year(2024)
    }

    fn spans(ranges: &[YearRange]) -> Vec<(i32, i32)> {
        ranges.iter().map(|r| (r.start_year(), r.end_year())).collect()
    }

    #[test]
    fn century_rule_for_every_two_digit_year() {
        for y in 0..=99 {
            let expected = if y <= 29 { 2000 + y } else { 1900 + y };
            assert_eq!(convert_short_year(y), expected, "year {y}");
        }
        assert_eq!(convert_short_year(29), 2029);
        assert_eq!(convert_short_year(30), 1930);
    }

    #[test]
    fn validity_window_follows_clock() {
        let p = processor();
        assert!(p.is_valid_year(1885));
        assert!(!p.is_valid_year(1884));
        assert!(p.is_valid_year(2029));
        assert!(!p.is_valid_year(2030));
    }

    #[test]
    fn format_precedence() {
        let p = processor();
        assert_eq!(p.detect_year_format("2010-2015"), YearFormat::RangeFull);
        assert_eq!(p.detect_year_format("'10-2015"), YearFormat::RangeMixed);
        assert_eq!(p.detect_year_format("'10-'15"), YearFormat::RangeShort);
        assert_eq!(p.detect_year_format("2010, 2012, 2015"), YearFormat::ListMixed);
        assert_eq!(p.detect_year_format("fits 2010"), YearFormat::FullYear);
        assert_eq!(p.detect_year_format("'15"), YearFormat::ShortYear);
        assert_eq!(p.detect_year_format("abc-def"), YearFormat::Invalid);
    }

    #[test]
    fn full_range() {
        let ranges = processor().extract_years_from_text("2010-2015", None);
        assert_eq!(spans(&ranges), vec![(2010, 2015)]);
        assert_eq!(ranges[0].format_detected, YearFormat::RangeFull);
        assert_eq!(ranges[0].original_text, "2010-2015");
    }

    #[test]
    fn full_range_alternate_separators() {
        let p = processor();
        assert_eq!(spans(&p.extract_years_from_text("2010~2015", None)), vec![(2010, 2015)]);
        assert_eq!(spans(&p.extract_years_from_text("2010 / 2015", None)), vec![(2010, 2015)]);
    }

    #[test]
    fn short_range() {
        let ranges = processor().extract_years_from_text("10-15", None);
        assert_eq!(spans(&ranges), vec![(2010, 2015)]);
        assert_eq!(ranges[0].format_detected, YearFormat::RangeShort);
    }

    #[test]
    fn short_range_applies_century_rule_to_both_ends() {
        let p = processor();
        assert_eq!(spans(&p.extract_years_from_text("30-99", None)), vec![(1930, 1999)]);
        assert_eq!(spans(&p.extract_years_from_text("00-29", None)), vec![(2000, 2029)]);
    }

    #[test]
    fn quoted_short_range() {
        let ranges = processor().extract_years_from_text("Fits '03-'08 and later", None);
        assert_eq!(spans(&ranges), vec![(2003, 2008)]);
    }

    #[test]
    fn mixed_range() {
        let ranges = processor().extract_years_from_text("'10-2015", None);
        assert_eq!(spans(&ranges), vec![(2010, 2015)]);
        assert_eq!(ranges[0].format_detected, YearFormat::RangeMixed);
    }

    #[test]
    fn reversed_range_is_normalized() {
        let ranges = processor().extract_years_from_text("2015-2010", None);
        assert_eq!(spans(&ranges), vec![(2010, 2015)]);
    }

    #[test]
    fn comma_list_yields_degenerate_ranges() {
        let ranges = processor().extract_years_from_text("2010,2012,2015", None);
        assert_eq!(spans(&ranges), vec![(2010, 2010), (2012, 2012), (2015, 2015)]);
        assert!(ranges.iter().all(|r| r.format_detected == YearFormat::FullYear));

        let short = processor().extract_years_from_text("'10,'12,'15", None);
        assert_eq!(spans(&short), vec![(2010, 2010), (2012, 2012), (2015, 2015)]);
        assert!(short.iter().all(|r| r.format_detected == YearFormat::ShortYear));
    }

    #[test]
    fn non_ascii_digits_are_not_years() {
        let p = processor();
        assert_eq!(p.detect_year_format("１０-１５"), YearFormat::Invalid);
        assert!(p.extract_years_from_text("１０-１５", None).is_empty());
        assert_eq!(p.detect_year_format("٢٠١٠"), YearFormat::Invalid);
    }

    #[test]
    fn single_full_years_are_all_collected() {
        let ranges = processor().extract_years_from_text("models 2004 and 2006 only", None);
        assert_eq!(spans(&ranges), vec![(2004, 2004), (2006, 2006)]);
    }

    #[test]
    fn empty_and_garbage_inputs() {
        let p = processor();
        assert!(p.extract_years_from_text("", None).is_empty());
        assert!(p.extract_years_from_text("   \n", None).is_empty());
        assert!(p.extract_years_from_text("abc-def", None).is_empty());
        assert_eq!(p.cache_stats().cached_entries, 1, "only abc-def is cached");
    }

    #[test]
    fn out_of_range_years_are_excluded() {
        let p = processor();
        assert!(p.parse_single_year("1850").is_none());
        assert!(p.parse_single_year("2031").is_none());
        assert!(p.parse_single_year("x9").is_none());
        assert!(p.extract_years_from_text("2040-2045", None).is_empty());
    }

    #[test]
    fn depo_brackets() {
        let p = processor();
        let ranges = p.extract_years_from_text("HEAD LAMP [2003-2008] LH", Some(VendorType::Depo));
        assert_eq!(spans(&ranges), vec![(2003, 2008)]);
        let ranges = p.extract_years_from_text("(10-15)", Some(VendorType::Depo));
        assert_eq!(spans(&ranges), vec![(2010, 2015)]);
    }

    #[test]
    fn hushan_year_prefix() {
        let ranges =
            processor().extract_years_from_text("Mirror Year: 2010-2015", Some(VendorType::Hushan));
        assert_eq!(spans(&ranges), vec![(2010, 2015)]);
    }

    #[test]
    fn yuto_type_suffix() {
        let ranges = processor().extract_years_from_text("10-15 type", Some(VendorType::Yuto));
        assert_eq!(spans(&ranges), vec![(2010, 2015)]);
    }

    #[test]
    fn vendor_hint_falls_back_to_generic_parsing() {
        let ranges = processor().extract_years_from_text("fits 2012", Some(VendorType::Depo));
        assert_eq!(spans(&ranges), vec![(2012, 2012)]);
    }

    #[test]
    fn cache_is_keyed_by_text_and_hint() {
        let p = processor();
        p.extract_years_from_text("[2003-2008]", None);
        p.extract_years_from_text("[2003-2008]", Some(VendorType::Depo));
        p.extract_years_from_text("[2003-2008]", None);
        // Two top-level keys plus the recursive inner fragment.
        assert_eq!(p.cache_stats().cached_entries, 3);
        assert!(p.cache_stats().memory_estimate > 0);
        assert_eq!(p.clear_cache(), 3);
        assert_eq!(p.cache_stats().cached_entries, 0);
    }

    #[test]
    fn expand_all_years_dedups_and_sorts() {
        let years = processor().expand_all_years("2012-2014", None);
        assert_eq!(years, vec![2012, 2013, 2014]);

        let p = processor();
        let years = p.expand_all_years("[2012-2014] (2013-2015)", Some(VendorType::Depo));
        assert_eq!(years, vec![2012, 2013, 2014, 2015]);
    }

    #[test]
    fn consolidate_adjacent() {
        let input = vec![
            YearRange::new(2013, 2015, "2013-2015", YearFormat::RangeFull),
            YearRange::new(2010, 2012, "2010-2012", YearFormat::RangeShort),
        ];
        let merged = consolidate_ranges(&input);
        assert_eq!(spans(&merged), vec![(2010, 2015)]);
        assert_eq!(merged[0].original_text, "2010-2012, 2013-2015");
        assert_eq!(merged[0].format_detected, YearFormat::RangeFull);
    }

    #[test]
    fn consolidate_keeps_gaps() {
        let input = vec![
            YearRange::new(2010, 2012, "", YearFormat::RangeFull),
            YearRange::new(2020, 2022, "", YearFormat::RangeFull),
        ];
        assert_eq!(spans(&consolidate_ranges(&input)), vec![(2010, 2012), (2020, 2022)]);

        let one_year_gap = vec![
            YearRange::new(2010, 2012, "", YearFormat::RangeFull),
            YearRange::new(2014, 2015, "", YearFormat::RangeFull),
        ];
        assert_eq!(consolidate_ranges(&one_year_gap).len(), 2);
    }

    #[test]
    fn consolidate_at_i32_max_does_not_overflow() {
        let input = vec![
            YearRange::new(i32::MAX - 2, i32::MAX, "", YearFormat::RangeFull),
            YearRange::single(i32::MAX, "", YearFormat::FullYear),
        ];
        assert_eq!(spans(&consolidate_ranges(&input)), vec![(i32::MAX - 2, i32::MAX)]);
    }

    #[test]
    fn consolidate_overlapping_and_contained() {
        let input = vec![
            YearRange::new(2010, 2018, "", YearFormat::RangeFull),
            YearRange::new(2012, 2014, "", YearFormat::RangeFull),
            YearRange::single(2019, "2019", YearFormat::FullYear),
        ];
        assert_eq!(spans(&consolidate_ranges(&input)), vec![(2010, 2019)]);
        assert!(consolidate_ranges(&[]).is_empty());
    }

    #[test]
    fn processor_is_shareable_across_threads() {
        let p = std::sync::Arc::new(processor());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let p = p.clone();
                std::thread::spawn(move || p.expand_all_years("2001-2003", None))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec![2001, 2002, 2003]);
        }
        assert_eq!(p.cache_stats().cached_entries, 1);
    }
}
