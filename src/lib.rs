pub mod auth;
pub mod backend;
pub mod conversation;
pub mod db;
pub mod error;
pub mod functions;
pub mod message;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod viewmodel;
