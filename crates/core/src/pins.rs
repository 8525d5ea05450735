//! Map-pin aggregation over the storage tree.

use crate::{StoreConfig, StoreError, StoreResult};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Summary of one location folder for the map view.
///
/// The id is the unambiguous composite `"{year}/{country}/{city}"`;
/// segments cannot contain `/`, so distinct locations never collide.
/// Coordinates are fixed at 0.0 (no geocoding).
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub id: String,
    pub country: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub year: i32,
    /// Count of all regular files directly in the city directory, not just
    /// images.
    pub image_count: usize,
}

/// Walks the whole storage tree to enumerate location pins.
///
/// No caching: every call performs the full three-level walk. Acceptable
/// for a low-traffic personal tool; an incremental index would be the next
/// step if the tree grows large.
#[derive(Debug)]
pub struct PinAggregator {
    cfg: Arc<StoreConfig>,
}

impl PinAggregator {
    pub fn new(cfg: Arc<StoreConfig>) -> Self {
        Self { cfg }
    }

    /// Enumerate all (year, country, city) locations with their file counts.
    ///
    /// First-level directories whose names do not parse as an integer (the
    /// `static/` subtree included) are skipped, as are non-directory entries
    /// at every level and names that are not valid UTF-8. Returns an empty
    /// vec when the storage root does not exist; order follows filesystem
    /// iteration and is unspecified.
    pub fn list_all_pins(&self) -> StoreResult<Vec<Pin>> {
        let root = self.cfg.storage_root();
        let mut pins = Vec::new();
        if !root.is_dir() {
            return Ok(pins);
        }

        for year_entry in fs::read_dir(root).map_err(StoreError::DirRead)? {
            let year_entry = year_entry.map_err(StoreError::DirRead)?;
            let year_path = year_entry.path();
            if !year_path.is_dir() {
                continue;
            }
            let year_name = year_entry.file_name();
            let Some(year) = year_name.to_str().and_then(|n| n.parse::<i32>().ok()) else {
                continue;
            };

            for country_entry in fs::read_dir(&year_path).map_err(StoreError::DirRead)? {
                let country_entry = country_entry.map_err(StoreError::DirRead)?;
                let country_path = country_entry.path();
                if !country_path.is_dir() {
                    continue;
                }
                let country_name = country_entry.file_name();
                let Some(country) = country_name.to_str() else {
                    continue;
                };

                for city_entry in fs::read_dir(&country_path).map_err(StoreError::DirRead)? {
                    let city_entry = city_entry.map_err(StoreError::DirRead)?;
                    let city_path = city_entry.path();
                    if !city_path.is_dir() {
                        continue;
                    }
                    let city_name = city_entry.file_name();
                    let Some(city) = city_name.to_str() else {
                        continue;
                    };

                    pins.push(Pin {
                        id: format!("{year}/{country}/{city}"),
                        country: country.to_string(),
                        city: city.to_string(),
                        lat: 0.0,
                        lng: 0.0,
                        year,
                        image_count: count_files(&city_path)?,
                    });
                }
            }
        }
        Ok(pins)
    }
}

/// Count regular files directly inside `dir` (no recursion, no filtering).
fn count_files(dir: &Path) -> StoreResult<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir).map_err(StoreError::DirRead)? {
        let entry = entry.map_err(StoreError::DirRead)?;
        if entry.path().is_file() {
            count += 1;
        }
    }
    Ok(count)
}
