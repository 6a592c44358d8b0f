//! Synthetic IRC server and virtual-user load harness for testing IRC clients.
//!
//! The [`server::IrcServer`] accepts clients, performs a minimal `NICK` handshake and
//! feeds every inbound line to a [`correlation::CorrelationRegistry`]. Each
//! [`virtual_user::VirtualUser`] sends generated actions through the server and waits
//! for the client's reply mentioning its nick.

pub mod actions;
pub mod config;
pub mod connection;
pub mod constants;
pub mod controller;
pub mod correlation;
pub mod echo_bot;
pub mod errors;
pub mod load;
pub mod message;
pub mod parsers;
pub mod replies;
pub mod sample;
pub mod server;
pub mod template;
pub mod types;
pub mod virtual_user;
