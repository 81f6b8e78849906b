mod assets;
mod commands;
mod download;
mod environment_struct;
mod layout;
mod progress;
mod provision;
mod settings;
mod setup_record;
mod validate;

pub use assets::*;
pub use commands::*;
pub use environment_struct::*;
pub use layout::*;
pub use progress::*;
pub use provision::*;
pub use settings::*;
pub use setup_record::*;

#[cfg(test)]
pub(crate) mod test_layout;
