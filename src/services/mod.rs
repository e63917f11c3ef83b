pub mod auth;
pub mod firms;
pub mod guard;
pub mod identity;
pub mod leads;
pub mod metrics;
pub mod poller;
pub mod provisioning;
pub mod session;
pub mod validation;
