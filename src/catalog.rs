//! Pulsar catalog lookup.
//!
//! The catalog is the last resort of the rotation-measure precedence chain.
//! The service location is threaded in from the loaded config; nothing here
//! reads the process environment.
use anyhow::{Context, Result};
use serde::Deserialize;

/// Catalogued rotation measure for one pulsar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogRm {
    pub rm: f64,
    pub rm_err: Option<f64>,
}

/// Rotation-measure source of record.
pub trait RmCatalog {
    /// Look up the catalogued RM for a pulsar. `Ok(None)` means the catalog
    /// has no measurement on record.
    fn rotation_measure(&self, pulsar: &str) -> Result<Option<CatalogRm>>;
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    rm: Option<f64>,
    rm_err: Option<f64>,
}

/// HTTP-backed catalog client.
///
/// The lookup is a single blocking GET with no retry; an unreachable
/// service is the caller's problem to downgrade, not ours to paper over.
pub struct HttpCatalog {
    url: Option<String>,
}

impl HttpCatalog {
    pub fn new(url: Option<String>) -> Self {
        Self { url }
    }
}

impl RmCatalog for HttpCatalog {
    fn rotation_measure(&self, pulsar: &str) -> Result<Option<CatalogRm>> {
        let Some(url) = self.url.as_deref() else {
            tracing::warn!("no pulsar catalog configured, skipping lookup");
            return Ok(None);
        };
        let mut response = ureq::get(url)
            .query("name", pulsar)
            .query("param", "RM")
            .call()
            .with_context(|| format!("query pulsar catalog at {url}"))?;
        let record: CatalogResponse = response
            .body_mut()
            .read_json()
            .context("parse catalog response JSON")?;
        Ok(response_to_record(record))
    }
}

fn response_to_record(response: CatalogResponse) -> Option<CatalogRm> {
    let rm = response.rm?;
    if !rm.is_finite() {
        return None;
    }
    Some(CatalogRm {
        rm,
        rm_err: response.rm_err.filter(|err| err.is_finite()),
    })
}
