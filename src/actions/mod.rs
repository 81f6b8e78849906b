mod config;
mod launcher;
mod setup;
mod shell;
mod status;
mod validate;

pub use config::*;
pub use launcher::*;
pub use setup::*;
pub use shell::*;
pub use status::*;
pub use validate::*;
