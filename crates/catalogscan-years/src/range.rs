use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape of a year expression as it appeared in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YearFormat {
    #[serde(rename = "full")]
    FullYear,
    #[serde(rename = "short")]
    ShortYear,
    #[serde(rename = "range_full")]
    RangeFull,
    #[serde(rename = "range_short")]
    RangeShort,
    #[serde(rename = "range_mixed")]
    RangeMixed,
    #[serde(rename = "list_mixed")]
    ListMixed,
    #[serde(rename = "invalid")]
    Invalid,
}

impl YearFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            YearFormat::FullYear => "full",
            YearFormat::ShortYear => "short",
            YearFormat::RangeFull => "range_full",
            YearFormat::RangeShort => "range_short",
            YearFormat::RangeMixed => "range_mixed",
            YearFormat::ListMixed => "list_mixed",
            YearFormat::Invalid => "invalid",
        }
    }
}

impl fmt::Display for YearFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inclusive span of model years.
///
/// Endpoints are always ordered: constructing with `start > end` swaps them.
/// Deserialization goes through the same constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawYearRange")]
pub struct YearRange {
    start_year: i32,
    end_year: i32,
    pub original_text: String,
    pub format_detected: YearFormat,
}

#[derive(Deserialize)]
struct RawYearRange {
    start_year: i32,
    end_year: i32,
    original_text: String,
    format_detected: YearFormat,
}

impl From<RawYearRange> for YearRange {
    fn from(raw: RawYearRange) -> Self {
        YearRange::new(
            raw.start_year,
            raw.end_year,
            raw.original_text,
            raw.format_detected,
        )
    }
}

impl YearRange {
    pub fn new(
        start_year: i32,
        end_year: i32,
        original_text: impl Into<String>,
        format_detected: YearFormat,
    ) -> Self {
        let (start_year, end_year) = if start_year > end_year {
            (end_year, start_year)
        } else {
            (start_year, end_year)
        };
        Self {
            start_year,
            end_year,
            original_text: original_text.into(),
            format_detected,
        }
    }

    /// A degenerate range covering one year.
    pub fn single(year: i32, original_text: impl Into<String>, format_detected: YearFormat) -> Self {
        Self::new(year, year, original_text, format_detected)
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    /// Every year in the range, ascending.
    pub fn expand(&self) -> Vec<i32> {
        (self.start_year..=self.end_year).collect()
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start_year <= year && year <= self.end_year
    }

    pub fn overlaps(&self, other: &YearRange) -> bool {
        !(self.end_year < other.start_year || other.end_year < self.start_year)
    }

    /// Number of years covered; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        (self.end_year - self.start_year) as usize + 1
    }

    pub fn is_single(&self) -> bool {
        self.start_year == self.end_year
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.start_year)
        } else {
            write!(f, "{}-{}", self.start_year, self.end_year)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_swaps_reversed_endpoints() {
        let r = YearRange::new(2015, 2010, "2015-2010", YearFormat::RangeFull);
        assert_eq!(r.start_year(), 2010);
        assert_eq!(r.end_year(), 2015);
    }

    #[test]
    fn deserialize_orders_reversed_endpoints() {
        let json = r#"{"start_year":2015,"end_year":2010,"original_text":"15-10","format_detected":"range_short"}"#;
        let r: YearRange = serde_json::from_str(json).unwrap();
        assert_eq!((r.start_year(), r.end_year()), (2010, 2015));
        assert_eq!(r.len(), 6);
        assert_eq!(r.expand(), vec![2010, 2011, 2012, 2013, 2014, 2015]);

        let back: YearRange = serde_json::from_str(&serde_json::to_string(&r).unwrap()).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn expand_is_inclusive() {
        for (a, b) in [(2010, 2010), (1998, 2003), (1885, 1890)] {
            let r = YearRange::new(a, b, "", YearFormat::RangeFull);
            let years = r.expand();
            assert_eq!(years.len(), (b - a + 1) as usize);
            assert_eq!(years.first(), Some(&a));
            assert_eq!(years.last(), Some(&b));
            assert!(years.windows(2).all(|w| w[1] == w[0] + 1));
            assert_eq!(r.len(), years.len());
        }
    }

    #[test]
    fn contains_and_overlaps() {
        let a = YearRange::new(2010, 2012, "", YearFormat::RangeFull);
        let b = YearRange::new(2012, 2014, "", YearFormat::RangeFull);
        let c = YearRange::new(2013, 2014, "", YearFormat::RangeFull);
        assert!(a.contains(2010) && a.contains(2012));
        assert!(!a.contains(2013));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn format_serializes_to_short_names() {
        assert_eq!(
            serde_json::to_string(&YearFormat::RangeShort).unwrap(),
            "\"range_short\""
        );
        assert_eq!(serde_json::to_string(&YearFormat::FullYear).unwrap(), "\"full\"");
    }

    #[test]
    fn display() {
        assert_eq!(YearRange::single(2004, "04", YearFormat::ShortYear).to_string(), "2004");
        assert_eq!(
            YearRange::new(2003, 2008, "", YearFormat::RangeFull).to_string(),
            "2003-2008"
        );
    }
}
