pub mod app;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;
