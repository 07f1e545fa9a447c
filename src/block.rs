// src/block.rs

//! Block ranges and their textual forms.
//!
//! A range is half-open: `[start_block, exclusive_end_block)`. Two textual
//! forms are accepted when parsing:
//!
//! - `[200, 300)` (the `Display` form)
//! - `200-300` (the form used in snapshot file names)
//!
//! Lists of ranges (e.g. the `substreams-partials-written` trailer) are
//! comma separated, in either form.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{anyhow, bail, Result};
use regex::Regex;

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*(\d+)\s*,\s*(\d+)\s*\)|(\d+)\s*-\s*(\d+)").expect("valid range regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRange {
    pub start_block: u64,
    pub exclusive_end_block: u64,
}

impl BlockRange {
    pub fn new(start_block: u64, exclusive_end_block: u64) -> Self {
        Self {
            start_block,
            exclusive_end_block,
        }
    }

    /// Number of blocks covered by the range.
    pub fn len(&self) -> u64 {
        self.exclusive_end_block.saturating_sub(self.start_block)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.start_block && block < self.exclusive_end_block
    }

    /// Split into consecutive chunks of at most `chunk_size` blocks.
    ///
    /// Chunks are aligned on the range start; the last one may be shorter.
    /// A `chunk_size` of 0 yields the range unchanged.
    pub fn split(&self, chunk_size: u64) -> Vec<BlockRange> {
        if self.is_empty() {
            return Vec::new();
        }
        if chunk_size == 0 {
            return vec![*self];
        }

        let mut out = Vec::new();
        let mut start = self.start_block;
        while start < self.exclusive_end_block {
            let end = start.saturating_add(chunk_size).min(self.exclusive_end_block);
            out.push(BlockRange::new(start, end));
            start = end;
        }
        out
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_block, self.exclusive_end_block)
    }
}

impl FromStr for BlockRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut ranges = parse_ranges(s)?;
        match (ranges.pop(), ranges.is_empty()) {
            (Some(range), true) => Ok(range),
            _ => Err(anyhow!("expected a single block range, got {s:?}")),
        }
    }
}

/// Parse a comma separated list of block ranges.
///
/// An empty (or whitespace only) input is an empty list. Anything that is
/// not a range or a separator is rejected.
pub fn parse_ranges(input: &str) -> Result<Vec<BlockRange>> {
    let mut out = Vec::new();
    let mut last_end = 0;

    for caps in RANGE_RE.captures_iter(input) {
        let whole = caps.get(0).ok_or_else(|| anyhow!("empty range match"))?;
        ensure_separator(&input[last_end..whole.start()], input)?;
        last_end = whole.end();

        let (lo, hi) = match (caps.get(1), caps.get(2)) {
            (Some(lo), Some(hi)) => (lo.as_str(), hi.as_str()),
            _ => match (caps.get(3), caps.get(4)) {
                (Some(lo), Some(hi)) => (lo.as_str(), hi.as_str()),
                _ => bail!("malformed block range in {input:?}"),
            },
        };

        let start: u64 = lo.parse()?;
        let end: u64 = hi.parse()?;
        if end < start {
            bail!("block range end {end} is before start {start} in {input:?}");
        }
        out.push(BlockRange::new(start, end));
    }

    ensure_separator(&input[last_end..], input)?;
    Ok(out)
}

fn ensure_separator(between: &str, input: &str) -> Result<()> {
    if between.chars().all(|c| c == ',' || c.is_whitespace()) {
        Ok(())
    } else {
        Err(anyhow!("unexpected {between:?} in block ranges {input:?}"))
    }
}

/// Render ranges the way `parse_ranges` reads them back.
pub fn format_ranges(ranges: &[BlockRange]) -> String {
    ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
