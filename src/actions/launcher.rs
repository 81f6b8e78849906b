use crate::environment::LinuxEnvironment;
use crate::outln;
use crate::util::set_json_output;
use anyhow::Result;
use serde_json::json;

/// Print what the session would run, without touching the filesystem
pub fn launcher(env: &LinuxEnvironment, argv: bool) -> Result<()> {
    if argv {
        let argv = env.direct_command();
        for arg in argv.iter() {
            outln!("{}", arg);
        }
        set_json_output("argv", json!(argv));
    } else {
        let script = env.launcher_script();
        outln!("{}", script.trim_end());
        set_json_output("script", json!(script));
    }
    Ok(())
}
