pub mod auth;
pub mod report_request;
