use serde::{Deserialize, Serialize};

/// Body of `POST /certificates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCertificateParams {
    /// Canonical endpoint URL: `scheme://host`, with `:port` appended only
    /// when the port is neither 443 nor 80.
    pub url: String,
}

/// One row of a bulk import, matching the `protocol,domain,port` columns the
/// service accepts. How rows are obtained (file upload, flags) is up to the
/// caller; the gateway only needs the set of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    /// Defaults to `https` when absent.
    pub protocol: Option<String>,

    pub domain: String,

    pub port: Option<u16>,
}
