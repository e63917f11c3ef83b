pub mod account;
pub mod auth;
pub mod firm;
pub mod lead;
pub mod principal;
