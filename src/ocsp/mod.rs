pub mod client;
pub mod der;
pub mod request;
pub mod response;

pub use client::{HttpOcspClient, OcspTransport};
pub use request::{build_request, CertId};
pub use response::{parse_response, OcspResponse, ResponseStatus};
