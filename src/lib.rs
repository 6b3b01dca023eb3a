mod image_loader;
mod page;
mod routes;
mod server;
mod storage;

pub mod app;
pub mod config;
pub mod detector;
pub mod telemetry;

pub use app::start_app;
