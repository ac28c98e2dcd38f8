//! # ituhouse_core
//!
//! Core domain logic for ituhouse: accounts, access tokens, email
//! verification codes and the stores behind them.

pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod mail;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
