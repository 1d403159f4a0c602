#![forbid(unsafe_code)]

pub mod boundary;
pub mod config;
pub mod http;

pub use boundary::{
    ExamSource, GatewayError, Gateways, GradingGateway, InMemoryGateway, SubmissionRequest,
};
pub use config::{ConfigError, GatewayConfig};
pub use http::HttpGateway;
