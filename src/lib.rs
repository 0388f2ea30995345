pub mod config;
pub mod dsa;
pub mod io;
pub mod optical_network;

pub use config::{ConfigError, RestorationConfig, RoundPolicy};
pub use optical_network::dispatcher::{Dispatcher, Reassignment, RestorationReport};
pub use optical_network::error::NetworkError;
pub use optical_network::session::{Controller, ScenarioOutcome, Session};
pub use optical_network::topology::{Demand, Link, Network, Node};
pub use optical_network::{DemandId, LinkId, NodeId, Path, PathSegment};
