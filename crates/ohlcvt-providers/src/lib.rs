pub mod error;
pub mod kraken;
pub mod provider;
