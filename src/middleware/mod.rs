pub mod auth;
pub mod firm;
pub mod rate_limit;
