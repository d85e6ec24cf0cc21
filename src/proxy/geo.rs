//! Country lookup for proxy hosts using a MaxMind MMDB database
//!
//! Plain-text feeds list bare addresses without a country; when a database
//! is configured the crawler fills the country in from here.

use crate::error::{ProxyError, Result};
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// GeoLocator for looking up IP addresses in MMDB databases
#[derive(Clone)]
pub struct GeoLocator {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoLocator {
    /// Create a new GeoLocator from an MMDB file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path)
            .map_err(|e| ProxyError::Geo(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Look up the ISO country code of a host, if it is an IP literal
    /// present in the database
    pub fn country_code(&self, host: &str) -> Option<String> {
        let ip: IpAddr = host.parse().ok()?;
        self.lookup_country(ip).ok().flatten()
    }

    /// Look up the ISO country code for an IpAddr
    pub fn lookup_country(&self, ip: IpAddr) -> Result<Option<String>> {
        let lookup_result = self
            .reader
            .lookup(ip)
            .map_err(|e| ProxyError::Geo(e.to_string()))?;

        let country: Option<geoip2::Country> = lookup_result
            .decode()
            .map_err(|e| ProxyError::Geo(e.to_string()))?;

        Ok(country.and_then(|c| c.country.iso_code.map(|code| code.to_uppercase())))
    }
}

impl std::fmt::Debug for GeoLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoLocator").finish_non_exhaustive()
    }
}
