//! Domain models shared by the store, the token codec and the API layer.

pub mod auth;
