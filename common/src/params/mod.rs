//! Input parameters sent to the certificate service.

mod certificate;
pub use certificate::*;
