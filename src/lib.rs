pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod prefs;
pub mod session;
#[cfg(test)]
pub mod test_helpers;
