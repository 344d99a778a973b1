pub mod candle;
pub mod error;
pub mod interval;
pub mod pair;
pub mod schema;
pub mod store;
