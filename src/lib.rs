pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod slack;
pub mod squadcast;
pub mod sync;
pub mod terminal;
