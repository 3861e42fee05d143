//! Network time distribution
//!
//! This module serves the local clock to NTP clients over UDP. Reachability
//! (link up, address assigned) must be established before the server binds.

mod server;

pub use self::server::TimeDistributionServer;
