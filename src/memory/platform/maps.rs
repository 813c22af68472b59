/*!
 * Memory Map Parsing
 *
 * Parses `/proc/<pid>/maps` style listings and derives the unmapped gaps
 * between the listed regions.
 */

use crate::core::errors::{BufferError, BufferResult};
use crate::core::range::AddressRange;
use crate::core::types::Address;

/// Parses a maps listing into the mapped ranges, in listing order
///
/// Only the leading `start-end` column is read. Blank lines are skipped,
/// anything else that doesn't start with two hex addresses is rejected.
pub fn parse_memory_map(listing: &str) -> BufferResult<Vec<AddressRange>> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_memory_map_entry)
        .collect()
}

fn parse_memory_map_entry(line: &str) -> BufferResult<AddressRange> {
    let malformed = || BufferError::MalformedPlatformData(format!("unrecognized maps line: {line:?}"));

    let column = line.split_ascii_whitespace().next().ok_or_else(malformed)?;
    let (start, end) = column.split_once('-').ok_or_else(malformed)?;
    let start = Address::from_str_radix(start, 16).map_err(|_| malformed())?;
    let end = Address::from_str_radix(end, 16).map_err(|_| malformed())?;

    if end <= start {
        return Err(malformed());
    }

    Ok(AddressRange::new(start, end - 1))
}

/// Complement of `mapped` within `[0, max_address]`, in ascending order
pub fn free_regions(mut mapped: Vec<AddressRange>, max_address: Address) -> Vec<AddressRange> {
    mapped.sort_unstable_by_key(|range| range.start);

    let mut free = Vec::with_capacity(mapped.len() + 1);
    let mut cursor = Some(0usize);

    for range in &mapped {
        let Some(next_free) = cursor else { break };
        if next_free > max_address {
            break;
        }

        if range.start > next_free {
            free.push(AddressRange::new(next_free, (range.start - 1).min(max_address)));
        }

        if range.end_inclusive >= next_free {
            cursor = range.end_inclusive.checked_add(1);
        }
    }

    if let Some(next_free) = cursor {
        if next_free <= max_address {
            free.push(AddressRange::new(next_free, max_address));
        }
    }

    free
}
