pub mod postgres;

pub use postgres::PostgresMarketStore;
