pub mod client;
pub mod signing;

pub use client::KucoinClient;
