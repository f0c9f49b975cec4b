pub mod config;
pub mod marketplaces;
