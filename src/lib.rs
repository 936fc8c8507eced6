pub mod classifier;
pub mod cli;
pub mod errors;
pub mod models;
pub mod payloads;
pub mod prober;
pub mod scanner;
pub mod signatures;
pub mod transport;
