// src/parsing/atlas.rs - Free-text extraction for Fishing Atlas location blobs
//
// Each scraped blob is "<location name>XXXX<popup text><coordinate readout>".
// The popup text repeats a "Fishing Information Point" banner per section; the
// section we want is the unique one naming the location and carrying the
// species sub-list. Every extraction rule is a named function so each field
// can be exercised on its own.
use std::fmt;
use std::ops::Range;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::core::{AssembledTable, FieldRecord};

const LOCATION_DELIMITER: &str = "XXXX";
const CHUNK_MARKER: &str = "Fishing Information Point";
const SPECIES_HEADER: &str = "Fish species:";
const SPECIES_SECTION_MARKER: &str = "Fish species:\n";
const SPECIES_END_MARKER: &str = "\nEase";
const WATER_LABEL: &str = "Water: ";
const ELEVATION_LABEL: &str = "Elevation(ft): ";
// Widest value the region bound accommodates: five digits plus a thousands
// separator.
const ELEVATION_TEMPLATE: &str = "Elevation(ft): 00,000";
const NOISE_TOKEN: &str = "Driving directions";
const LOADING_MARKER: &str = "Loading...";
const COORDINATE_MARKER: &str = "Zoom to";

static LATITUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Latitude: (\d+\.\d+) ([NS])").unwrap());
static LONGITUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Longitude: (-?\d+\.\d+) ([EW])").unwrap());

/// Recoverable reasons a blob yields no record. Every variant resolves to
/// skip-plus-warning; none of them aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSkip {
    /// The source page never finished rendering this location.
    LoadingNotComplete { location: String },
    /// Zero or more than one info chunk qualified for the location name.
    AmbiguousLocationMatch { location: String, matches: usize },
    /// The qualifying chunk lacks the "Water:" anchor or the elevation label.
    FieldRegionNotFound { location: String },
    /// Latitude/longitude pattern absent from the coordinate text.
    CoordinateNotFound {
        location: String,
        what: &'static str,
    },
}

impl fmt::Display for ParseSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSkip::LoadingNotComplete { location } => {
                write!(f, "Data did not load for {}", location)
            }
            ParseSkip::AmbiguousLocationMatch { location, matches } => write!(
                f,
                "Did not find exactly 1 match for location: {}. Found {} matches",
                location, matches
            ),
            ParseSkip::FieldRegionNotFound { location } => write!(
                f,
                "Could not bound the descriptive field region for {}",
                location
            ),
            ParseSkip::CoordinateNotFound { location, what } => {
                write!(f, "No {} found in coordinate text for {}", what, location)
            }
        }
    }
}

/// Running totals for one batch of blobs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseStats {
    pub parsed: usize,
    pub skipped: usize,
}

fn location_name(blob: &str) -> &str {
    blob.split(LOCATION_DELIMITER).next().unwrap_or("")
}

/// Finds the unique chunk naming the location and carrying the species
/// section.
fn find_location_chunk<'a>(blob: &'a str, location: &str) -> Result<&'a str, ParseSkip> {
    let matches: Vec<&str> = blob
        .split(CHUNK_MARKER)
        .filter(|chunk| chunk.contains(location) && chunk.contains(SPECIES_SECTION_MARKER))
        .collect();

    if matches.len() == 1 {
        debug!("Found data for {}", location);
        Ok(matches[0])
    } else {
        Err(ParseSkip::AmbiguousLocationMatch {
            location: location.to_string(),
            matches: matches.len(),
        })
    }
}

/// Bounds the descriptive field region: from "Water: <location>" to a fixed
/// offset past the elevation label, wide enough for a five-digit value with a
/// thousands separator. Everything after that is popup chrome.
fn locate_field_region<'a>(chunk: &'a str, location: &str) -> Option<&'a str> {
    let anchor = format!("{}{}", WATER_LABEL, location);
    let start = chunk.find(&anchor)?;
    let elevation = chunk[start..].find(ELEVATION_LABEL)?;

    let mut end = (start + elevation + ELEVATION_TEMPLATE.len()).min(chunk.len());
    while !chunk.is_char_boundary(end) {
        end -= 1;
    }
    Some(&chunk[start..end])
}

/// Pulls the species sub-list out of the field region. Returns the
/// comma-joined species values (per-line type labels like "Trout:" stripped)
/// and the byte range of the block so the caller can excise it.
fn extract_species_list(region: &str) -> Option<(String, Range<usize>)> {
    let start = region.find(SPECIES_HEADER)?;
    let body_start = start + SPECIES_HEADER.len();
    let rest = &region[body_start..];

    let (body, removed_end) = match rest.find(SPECIES_END_MARKER) {
        // Drop the trailing newline too so "Ease of access" starts a line.
        Some(idx) => (&rest[..idx], body_start + idx + 1),
        None => (rest, region.len()),
    };

    let species: Vec<&str> = body
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    Some((species.join(", "), start..removed_end))
}

fn capture_coordinate(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    Some(format!("{} {}", caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Parses one raw location blob into a [`FieldRecord`].
///
/// Field order matches the source layout: the synthesized `Fish Species`
/// first, then the `label: value` lines of the field region, then `Latitude`
/// and `Longitude` from the coordinate readout.
pub fn parse_location_blob(blob: &str) -> Result<FieldRecord, ParseSkip> {
    let location = location_name(blob);

    if blob.contains(LOADING_MARKER) {
        return Err(ParseSkip::LoadingNotComplete {
            location: location.to_string(),
        });
    }

    let chunk = find_location_chunk(blob, location)?;
    let region =
        locate_field_region(chunk, location).ok_or_else(|| ParseSkip::FieldRegionNotFound {
            location: location.to_string(),
        })?;

    let (species_value, species_span) =
        extract_species_list(region).ok_or_else(|| ParseSkip::FieldRegionNotFound {
            location: location.to_string(),
        })?;

    let mut record = FieldRecord::new();
    record.push("Fish Species", species_value);

    let mut remainder = String::with_capacity(region.len());
    remainder.push_str(&region[..species_span.start]);
    remainder.push_str(&region[species_span.end..]);
    let remainder = remainder.replace(NOISE_TOKEN, "");

    for line in remainder.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((label, value)) => {
                record.push(label.trim(), value.trim());
            }
            None => debug!("Element {} does not contain a ':'", line),
        }
    }

    let coordinates = blob
        .split_once(COORDINATE_MARKER)
        .map(|(_, tail)| tail)
        .ok_or(ParseSkip::CoordinateNotFound {
            location: location.to_string(),
            what: "coordinate text",
        })?;

    let latitude =
        capture_coordinate(&LATITUDE_RE, coordinates).ok_or(ParseSkip::CoordinateNotFound {
            location: location.to_string(),
            what: "latitude",
        })?;
    let longitude =
        capture_coordinate(&LONGITUDE_RE, coordinates).ok_or(ParseSkip::CoordinateNotFound {
            location: location.to_string(),
            what: "longitude",
        })?;

    record.push("Latitude", latitude);
    record.push("Longitude", longitude);

    Ok(record)
}

/// Parses a batch of blobs into one aligned table. Blobs that fail to parse
/// are skipped with a warning; one bad location never fails the species run.
pub fn process_location_blobs(raw_blobs: &[String]) -> (AssembledTable, ParseStats) {
    let mut table = AssembledTable::new();
    let mut stats = ParseStats::default();

    for blob in raw_blobs {
        match parse_location_blob(blob) {
            Ok(record) => {
                table.push_record(&record);
                table.align();
                stats.parsed += 1;
            }
            Err(skip) => {
                warn!("{}", skip);
                stats.skipped += 1;
            }
        }
    }

    table.align();
    info!(
        "Parsed {} of {} location blob(s) into {} column(s)",
        stats.parsed,
        raw_blobs.len(),
        table.num_columns()
    );
    (table, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arthur_lake_blob() -> String {
        concat!(
            "Arthur LakeXXXX",
            "Results (1)\n",
            "Fishing Information Point",
            "Water: Arthur Lake\n",
            "County: Chaffee\n",
            "Property name: San Isabel National Forest\n",
            "Fish species:\n",
            "Trout: Cutthroat\n",
            "Trout: Golden\n",
            "Ease of access: Difficult\n",
            "Boating: None\n",
            "Fishing pressure: Low\n",
            "Stocked: No\n",
            "Driving directions\n",
            "Elevation(ft): 1,000\n",
            "Zoom to\n",
            "NAD83 UTM Zone 13N: 384447, 4273326",
            "Latitude: 38.60092 N    Longitude: -106.32702 W    Decimal Degrees",
        )
        .to_string()
    }

    #[test]
    fn test_field_region_is_bounded() {
        let blob = arthur_lake_blob();
        let chunk = find_location_chunk(&blob, "Arthur Lake").unwrap();
        let region = locate_field_region(chunk, "Arthur Lake").unwrap();

        assert_eq!(
            region,
            "Water: Arthur Lake\nCounty: Chaffee\nProperty name: San Isabel National Forest\n\
             Fish species:\nTrout: Cutthroat\nTrout: Golden\nEase of access: Difficult\n\
             Boating: None\nFishing pressure: Low\nStocked: No\nDriving directions\n\
             Elevation(ft): 1,000\n"
        );
    }

    #[test]
    fn test_species_list_is_joined_and_excised() {
        let region = "Water: Arthur Lake\nFish species:\nTrout: Cutthroat\nTrout: Golden\nEase of access: Difficult\n";
        let (species, span) = extract_species_list(region).unwrap();

        assert_eq!(species, "Cutthroat, Golden");
        let mut remainder = String::new();
        remainder.push_str(&region[..span.start]);
        remainder.push_str(&region[span.end..]);
        assert_eq!(remainder, "Water: Arthur Lake\nEase of access: Difficult\n");
    }

    #[test]
    fn test_parse_full_blob() {
        let record = parse_location_blob(&arthur_lake_blob()).unwrap();

        let fields: Vec<(&str, &str)> = record
            .iter()
            .map(|(l, v)| (l.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("Fish Species", "Cutthroat, Golden"),
                ("Water", "Arthur Lake"),
                ("County", "Chaffee"),
                ("Property name", "San Isabel National Forest"),
                ("Ease of access", "Difficult"),
                ("Boating", "None"),
                ("Fishing pressure", "Low"),
                ("Stocked", "No"),
                ("Elevation(ft)", "1,000"),
                ("Latitude", "38.60092 N"),
                ("Longitude", "-106.32702 W"),
            ]
        );
    }

    #[test]
    fn test_loading_marker_short_circuits() {
        let blob = "Arthur LakeXXXXLoading...";
        assert_eq!(
            parse_location_blob(blob),
            Err(ParseSkip::LoadingNotComplete {
                location: "Arthur Lake".to_string()
            })
        );
    }

    #[test]
    fn test_zero_chunk_matches_are_ambiguous() {
        let blob = "Arthur LakeXXXXFishing Information PointWater: Some Other Lake\nFish species:\nTrout: Brown\nEase of access: Easy\n";
        assert_eq!(
            parse_location_blob(blob),
            Err(ParseSkip::AmbiguousLocationMatch {
                location: "Arthur Lake".to_string(),
                matches: 0
            })
        );
    }

    #[test]
    fn test_multiple_chunk_matches_are_ambiguous() {
        let one = concat!(
            "Fishing Information Point",
            "Water: Arthur Lake\nFish species:\nTrout: Brown\nEase of access: Easy\n",
        );
        let blob = format!("Arthur LakeXXXX{}{}", one, one);
        assert_eq!(
            parse_location_blob(&blob),
            Err(ParseSkip::AmbiguousLocationMatch {
                location: "Arthur Lake".to_string(),
                matches: 2
            })
        );
    }

    #[test]
    fn test_missing_longitude_is_guarded() {
        let blob = arthur_lake_blob().replace("Longitude", "Lngitude");
        assert_eq!(
            parse_location_blob(&blob),
            Err(ParseSkip::CoordinateNotFound {
                location: "Arthur Lake".to_string(),
                what: "longitude",
            })
        );
    }

    #[test]
    fn test_lines_without_delimiter_are_dropped() {
        let blob = arthur_lake_blob().replace("Stocked: No\n", "Stocked No\n");
        let record = parse_location_blob(&blob).unwrap();
        assert_eq!(record.get("Stocked"), None);
        assert_eq!(record.get("Boating"), Some("None"));
    }

    #[test]
    fn test_batch_skips_bad_blobs_and_stays_aligned() {
        let blobs = vec![
            arthur_lake_blob(),
            "Ghost LakeXXXXLoading...".to_string(),
        ];
        let (table, stats) = process_location_blobs(&blobs);

        assert_eq!(stats.parsed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(table.num_rows(), 1);
        assert!(table.is_aligned());
        assert_eq!(table.value("Fish Species", 0), Some("Cutthroat, Golden"));
        assert_eq!(table.value("Water", 0), Some("Arthur Lake"));
        assert_eq!(table.value("Elevation(ft)", 0), Some("1,000"));
        assert_eq!(table.value("Latitude", 0), Some("38.60092 N"));
        assert_eq!(table.value("Longitude", 0), Some("-106.32702 W"));
    }
}
