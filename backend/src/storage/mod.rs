pub mod container;
pub mod paths;
pub mod payload;

pub use container::{open_container, read_container, seal_container, write_container};
pub use paths::WalletPaths;
