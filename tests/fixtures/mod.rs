mod fixture_env;

pub use fixture_env::*;
