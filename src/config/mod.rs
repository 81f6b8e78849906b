pub mod cli;
pub mod impls;
pub mod resolve;
pub mod structs;

pub use impls::CONFIG_KEYS;
pub use resolve::resolve_config;
pub use structs::*;
