//! Market Data Adapters
//!
//! - `JupiterPriceClient`: Jupiter price API client backing the price oracle port

mod jupiter_price;

pub use jupiter_price::{parse_price, JupiterPriceClient, PriceError};
