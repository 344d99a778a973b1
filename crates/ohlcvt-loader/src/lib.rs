pub mod batch;
pub mod config;
pub mod error;
pub mod historical;
pub mod incremental;

#[cfg(test)]
mod test_support;
