//! Service backends
//!
//! The core only talks to the service traits in [`crate::stack::client`] and
//! [`crate::cluster::client`]. The local backend simulates the remote
//! services against a state file so clusters can be brought up and torn down
//! without a cloud account.

pub mod local;

pub use local::LocalBackend;
