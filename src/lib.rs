pub mod agents;
pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod moderation;
pub mod routes;
pub mod search;
pub mod state;
