pub mod aggregate;
pub mod buckets;
pub mod config;
pub mod feed;
pub mod model;
pub mod over25;
pub mod paste;
pub mod report;
pub mod scoring;
pub mod store;
pub mod tracker;
