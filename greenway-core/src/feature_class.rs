//! The feature classes published by the county greenway services.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Attributes;

/// Attribute injected into every stored trail record.
pub const TRAIL_OWNER_FIELD: &str = "trailowner";

/// Owning authority recorded against every stored trail record.
pub const TRAIL_OWNER: &str = "Mecklenburg";

/// One of the greenway data categories kept in the feature store.
///
/// Each class owns exactly one store table and one upstream source.
///
/// # Examples
///
/// ```
/// use greenway_core::FeatureClass;
///
/// let class: FeatureClass = "milemarkers".parse().expect("known class");
/// assert_eq!(class, FeatureClass::MileMarkers);
/// assert_eq!(class.table_name(), "markers");
/// assert_eq!(class.label(), "mile markers");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureClass {
    /// Trail entrances (points).
    Entrances,
    /// Mile markers along the trails (points).
    MileMarkers,
    /// Trail segments (lines).
    Trails,
}

impl FeatureClass {
    /// Every feature class, in sync order.
    pub const ALL: [Self; 3] = [Self::Entrances, Self::MileMarkers, Self::Trails];

    /// Identifier used in routes and on the command line.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Entrances => "entrances",
            Self::MileMarkers => "milemarkers",
            Self::Trails => "trails",
        }
    }

    /// Name of the store table holding this class.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Entrances => "entrances",
            Self::MileMarkers => "markers",
            Self::Trails => "trails",
        }
    }

    /// Lower-case human readable name, used in error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Entrances => "entrances",
            Self::MileMarkers => "mile markers",
            Self::Trails => "trails",
        }
    }

    /// Capitalised human readable name, used in acknowledgements.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Entrances => "Entrances",
            Self::MileMarkers => "Mile markers",
            Self::Trails => "Trails",
        }
    }

    /// Whether line parts of one record are merged before storage.
    #[must_use]
    pub const fn merges_lines(self) -> bool {
        matches!(self, Self::Trails)
    }

    /// Apply the write-time attribute rules for this class.
    ///
    /// Trails always carry [`TRAIL_OWNER_FIELD`] set to [`TRAIL_OWNER`],
    /// whatever the upstream supplied. Other classes pass through untouched.
    ///
    /// ```
    /// use greenway_core::{Attributes, FeatureClass, TRAIL_OWNER};
    ///
    /// let mut attributes = Attributes::new();
    /// attributes.insert("trailowner".into(), "Someone else".into());
    /// FeatureClass::Trails.apply_attribute_rules(&mut attributes);
    /// assert_eq!(attributes["trailowner"], TRAIL_OWNER);
    /// ```
    pub fn apply_attribute_rules(self, attributes: &mut Attributes) {
        if matches!(self, Self::Trails) {
            attributes.insert(TRAIL_OWNER_FIELD.to_owned(), TRAIL_OWNER.into());
        }
    }
}

impl fmt::Display for FeatureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Error returned when a string names no known feature class.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown feature class '{input}'; expected one of entrances, milemarkers, trails")]
pub struct ParseFeatureClassError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for FeatureClass {
    type Err = ParseFeatureClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "entrances" => Ok(Self::Entrances),
            "milemarkers" | "mile-markers" | "markers" => Ok(Self::MileMarkers),
            "trails" => Ok(Self::Trails),
            _ => Err(ParseFeatureClassError {
                input: s.to_owned(),
            }),
        }
    }
}
