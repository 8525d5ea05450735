//! Location keys and path-segment validation.

use crate::{StoreError, StoreResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// A validated (year, country, city) tuple identifying one location folder.
///
/// Country and city are used directly as directory names, so they are
/// checked up front: empty segments, `.`/`..` and anything containing a
/// path separator or NUL byte are rejected before any filesystem call.
/// Construction is the only way to obtain a key, which keeps every path
/// composed from one inside the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationKey {
    year: i32,
    country: String,
    city: String,
}

impl LocationKey {
    /// Validate and build a location key.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidInput` if the country or city segment is
    /// empty, a relative path component, or contains a separator.
    pub fn new(
        year: i32,
        country: impl Into<String>,
        city: impl Into<String>,
    ) -> StoreResult<Self> {
        let country = country.into();
        let city = city.into();
        validate_segment("country", &country)?;
        validate_segment("city", &city)?;
        Ok(Self {
            year,
            country,
            city,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    /// Directory for this location: `{root}/{year}/{country}/{city}`.
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(self.year.to_string())
            .join(&self.country)
            .join(&self.city)
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.year, self.country, self.city)
    }
}

/// Validate a client-supplied path segment (location part or filename).
///
/// # Errors
/// Returns `StoreError::InvalidInput` naming `field` when the value cannot
/// be used as a single directory entry name.
pub fn validate_segment(field: &str, value: &str) -> StoreResult<()> {
    if value.is_empty() {
        return Err(StoreError::InvalidInput(format!("{field} must not be empty")));
    }
    if value == "." || value == ".." {
        return Err(StoreError::InvalidInput(format!(
            "{field} must not be a relative path component"
        )));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidInput(format!(
            "{field} must not contain path separators"
        )));
    }
    Ok(())
}
