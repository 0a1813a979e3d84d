//! The local bare mirror of the remote repository.

mod config;
mod store;

pub use config::{MirrorConfig, MirrorConfigBuilder};
pub use store::{MirrorState, MirrorStore};
