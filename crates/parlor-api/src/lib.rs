pub mod error;
pub mod history;
pub mod messages;
pub mod middleware;
pub mod rooms;
pub mod routes;
pub mod state;
pub mod stream;
