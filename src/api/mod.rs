pub mod health;
pub mod latency;
pub mod owner;
pub mod routes;
