pub mod bet_store;

pub use bet_store::InMemoryBetStore;
