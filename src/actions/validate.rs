use crate::environment::LinuxEnvironment;
use crate::outln;
use crate::util::set_json_output;
use anyhow::Result;
use log::debug;
use serde_json::Value;

pub fn validate(env: &LinuxEnvironment) -> Result<()> {
    debug!("Validating {}", env.layout.base.display());
    match env.validate() {
        Ok(()) => {
            set_json_output("valid", Value::Bool(true));
            outln!("ok");
            Ok(())
        }
        Err(e) => {
            set_json_output("valid", Value::Bool(false));
            Err(e.into())
        }
    }
}
