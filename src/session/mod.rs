mod finish;
mod session_struct;
mod spawn;
mod terminal;
mod watcher;

pub use session_struct::*;
pub use terminal::*;
