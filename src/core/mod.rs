pub mod cli;
pub mod config;
pub mod kademlia;

pub use cli::Shell;
pub use config::Config;
pub use kademlia::Kademlia;
