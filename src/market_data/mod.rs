pub mod ticker_stream;

pub use ticker_stream::spawn_first_price;
