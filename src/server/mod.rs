pub mod config;
mod http_layers;
pub mod server;
pub mod session;
mod song_routes;
pub mod state;
mod user_routes;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server, SongServices};
pub use song_routes::status_response_parts;
