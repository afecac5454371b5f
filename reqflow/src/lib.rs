#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use reqflow_core::*;

#[cfg(feature = "aws")]
pub mod aws {
    pub use reqflow_aws_v4::*;
}

#[cfg(feature = "http-send-reqwest")]
pub mod http_send_reqwest {
    pub use reqflow_http_send_reqwest::*;
}
