pub mod calendar;
pub mod config;
pub mod controller;
pub mod error;
pub mod projection;
pub mod repository;
pub mod screen;
pub mod session;
pub mod shift;
pub mod store;
