//! CRL distribution points extension.

use der::{Any, Decode, Encode};
use tracing::debug;
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};

/// URLs extracted from a `cRLDistributionPoints` extension.
///
/// Only points carrying a full name whose first entry is a URI contribute.
/// Relative names, issuer-only points and entries that fail to decode are
/// skipped one by one; they never invalidate the certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrlDistributionPoints {
    urls: Vec<String>,
}

impl CrlDistributionPoints {
    /// Parses the DER value of the extension.
    #[must_use]
    pub fn from_extension(value: &[u8]) -> Self {
        let points = match Vec::<Any>::from_der(value) {
            Ok(points) => points,
            Err(e) => {
                debug!(error = %e, "distribution points extension is not a sequence");
                return Self::default();
            }
        };

        let urls = points
            .iter()
            .filter_map(|point| {
                let encoded = point.to_der().ok()?;
                match DistributionPoint::from_der(&encoded) {
                    Ok(point) => first_uri(&point),
                    Err(e) => {
                        debug!(error = %e, "skipping undecodable distribution point");
                        None
                    }
                }
            })
            .collect();
        Self { urls }
    }

    #[must_use]
    pub fn has_urls(&self) -> bool {
        !self.urls.is_empty()
    }

    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    #[must_use]
    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }
}

fn first_uri(point: &DistributionPoint) -> Option<String> {
    match point.distribution_point.as_ref()? {
        DistributionPointName::FullName(names) => match names.first()? {
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
            _ => None,
        },
        _ => None,
    }
}
