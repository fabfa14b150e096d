//! HTTP types and transports for the conduit request pipeline.

pub mod client;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{build_client, HttpConfig, ReqwestTransport};
pub use request::{headers, HttpRequest};
pub use response::{HttpResponse, ResponseError};
pub use transport::{AttemptTimeout, BoxError, FailureClass, Transport, TransportError};

pub use reqwest::header::HeaderMap;
pub use reqwest::Method;
