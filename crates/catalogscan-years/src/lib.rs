//! Model-year parsing for auto-parts catalogs.
//!
//! Catalogs write compatibility years in many shapes: `2010-2015`, `'03-'08`,
//! `10~2015`, comma lists, and vendor framings such as `[2003-2008]` or
//! `Year: 10-15`. [`YearProcessor`] turns any of these into [`YearRange`]s
//! of four-digit years within the automotive era.

use catalogscan_core::VendorType;
use once_cell::sync::Lazy;

pub mod processor;
pub mod range;
pub mod summary;

pub use processor::{
    CENTURY_PIVOT, FUTURE_YEAR_MARGIN, MIN_AUTOMOTIVE_YEAR, YearProcessor, consolidate_ranges,
};
pub use range::{YearFormat, YearRange};
pub use summary::{CacheStats, CompatibilityReport, DecadeBucket, decade_summary};

static GLOBAL_PROCESSOR: Lazy<YearProcessor> = Lazy::new(YearProcessor::new);

/// Process-wide processor backing the free functions below.
pub fn year_processor() -> &'static YearProcessor {
    &GLOBAL_PROCESSOR
}

/// Parse year ranges from `text` with the shared processor.
pub fn parse_years(text: &str, vendor_hint: Option<VendorType>) -> Vec<YearRange> {
    GLOBAL_PROCESSOR.extract_years_from_text(text, vendor_hint)
}

/// Every year mentioned in `text`, sorted and deduplicated.
pub fn expand_years(text: &str, vendor_hint: Option<VendorType>) -> Vec<i32> {
    GLOBAL_PROCESSOR.expand_all_years(text, vendor_hint)
}

pub fn convert_short_year(short_year: i32) -> i32 {
    processor::convert_short_year(short_year)
}
