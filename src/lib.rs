pub mod app;
pub mod cache;
pub mod fetch;
pub mod models;
pub mod ratings;
pub mod seed;
pub mod store;
pub mod tmdb;
