pub mod config;
pub mod coords;
pub mod detail;
pub mod error;
pub mod extract;
pub mod feature;
pub mod fetch;
pub mod listing;
pub mod output;
pub mod pipeline;
pub mod record;
