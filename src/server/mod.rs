/// The HTTP transport seam and its reqwest implementation.
mod http;
/// The report aggregation service's request and response formats.
mod fetch;

pub use fetch::{
    window_start, FetchError, ReportFetchClient, ReportFetchRequest, ReportResponse, ReportResults,
};
pub use http::{HttpClient, ReqwestHttpClient, TransportError};
