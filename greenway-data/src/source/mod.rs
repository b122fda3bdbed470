//! Upstream feature sources.
//!
//! Each feature class is published by the county as an ArcGIS feature service
//! that can answer with GeoJSON. A [`FeatureSource`] fetches the full current
//! snapshot of one class in a single request.

mod http;
mod payload;
#[doc(hidden)]
pub mod test_support;

use std::time::Duration;

use async_trait::async_trait;
use greenway_core::FeatureClass;
use thiserror::Error;

pub use http::{
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, HttpFeatureSource, HttpFeatureSourceConfig,
    SourceBuildError,
};
pub use payload::{SourceFeature, SourceId, SourceSnapshot};

const MECKLENBURG_SERVICES: &str = "https://meckgis.mecklenburgcountync.gov/server/rest/services";

/// Default upstream URL for a feature class.
///
/// ```
/// use greenway_core::FeatureClass;
/// use greenway_data::default_source_url;
///
/// assert!(default_source_url(FeatureClass::Trails).contains("/GreenwayTrails/"));
/// ```
#[must_use]
pub fn default_source_url(class: FeatureClass) -> String {
    let service = match class {
        FeatureClass::Entrances => "GreenwayTrailEntrances",
        FeatureClass::MileMarkers => "GreenwayMileMarkers",
        FeatureClass::Trails => "GreenwayTrails",
    };
    format!("{MECKLENBURG_SERVICES}/{service}/FeatureServer/0/query?where=1=1&outFields=*&f=geojson")
}

/// Broad category of a [`SourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The service could not be reached or did not answer in time.
    Unreachable,
    /// The service answered with something other than a feature collection.
    PayloadInvalid,
}

/// Errors raised while fetching a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The request did not complete within the timeout.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout.
        timeout: Duration,
    },
    /// The connection failed before a response arrived.
    #[error("network error requesting {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport diagnostic.
        message: String,
    },
    /// The service answered with a non-success status.
    #[error("{url} answered with HTTP {status}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Transport diagnostic.
        message: String,
    },
    /// The service answered with a structured error document.
    #[error("{url} reported error {code}: {message}")]
    Service {
        /// Requested URL.
        url: String,
        /// Service error code.
        code: i64,
        /// Service error message.
        message: String,
    },
    /// The body was not a feature collection.
    #[error("invalid feature collection from {url}: {message}")]
    Payload {
        /// Requested URL.
        url: String,
        /// Parser diagnostic.
        message: String,
    },
}

impl SourceError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> SourceErrorKind {
        match self {
            Self::Timeout { .. } | Self::Network { .. } | Self::Http { .. } => {
                SourceErrorKind::Unreachable
            }
            Self::Service { .. } | Self::Payload { .. } => SourceErrorKind::PayloadInvalid,
        }
    }
}

/// A provider of full feature snapshots for one class.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Human readable location of the source, used in logs.
    fn location(&self) -> &str;

    /// Fetch the current snapshot.
    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, SourceError>;
}

/// One source per feature class.
#[derive(Debug, Clone)]
pub struct FeatureSources<F> {
    entrances: F,
    mile_markers: F,
    trails: F,
}

impl<F> FeatureSources<F> {
    /// Group the three per-class sources.
    pub const fn new(entrances: F, mile_markers: F, trails: F) -> Self {
        Self {
            entrances,
            mile_markers,
            trails,
        }
    }

    /// Build every source with a fallible constructor.
    pub fn try_from_fn<E>(mut build: impl FnMut(FeatureClass) -> Result<F, E>) -> Result<Self, E> {
        Ok(Self::new(
            build(FeatureClass::Entrances)?,
            build(FeatureClass::MileMarkers)?,
            build(FeatureClass::Trails)?,
        ))
    }

    /// Build every source with an infallible constructor.
    pub fn from_fn(mut build: impl FnMut(FeatureClass) -> F) -> Self {
        Self::new(
            build(FeatureClass::Entrances),
            build(FeatureClass::MileMarkers),
            build(FeatureClass::Trails),
        )
    }

    /// The source for a class.
    pub const fn get(&self, class: FeatureClass) -> &F {
        match class {
            FeatureClass::Entrances => &self.entrances,
            FeatureClass::MileMarkers => &self.mile_markers,
            FeatureClass::Trails => &self.trails,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FeatureClass::Entrances, "GreenwayTrailEntrances")]
    #[case(FeatureClass::MileMarkers, "GreenwayMileMarkers")]
    #[case(FeatureClass::Trails, "GreenwayTrails")]
    fn default_urls_request_geojson(#[case] class: FeatureClass, #[case] service: &str) {
        let url = default_source_url(class);
        assert!(url.starts_with("https://meckgis.mecklenburgcountync.gov/"));
        assert!(url.contains(&format!("/{service}/FeatureServer/0/query")));
        assert!(url.ends_with("f=geojson"));
        assert!(url::Url::parse(&url).is_ok());
    }

    #[rstest]
    fn sources_are_looked_up_by_class() {
        let sources = FeatureSources::from_fn(FeatureClass::slug);
        for class in FeatureClass::ALL {
            assert_eq!(*sources.get(class), class.slug());
        }
    }

    #[rstest]
    fn error_kinds_separate_transport_from_payload() {
        let timeout = SourceError::Timeout {
            url: "https://example.org".to_owned(),
            timeout: Duration::from_secs(30),
        };
        let payload = SourceError::Payload {
            url: "https://example.org".to_owned(),
            message: "expected value".to_owned(),
        };
        assert_eq!(timeout.kind(), SourceErrorKind::Unreachable);
        assert_eq!(payload.kind(), SourceErrorKind::PayloadInvalid);
    }
}
