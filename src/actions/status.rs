use crate::environment::LinuxEnvironment;
use crate::outln;
use crate::util::set_json_output;
use anyhow::{Context, Result};
use log::warn;
use serde_json::{Map, Value};

pub fn status(env: &LinuxEnvironment) -> Result<()> {
    let complete = env.is_setup_complete();
    outln!("Setup complete: {}", if complete { "yes" } else { "no" });
    set_json_output("complete", Value::Bool(complete));

    let mut paths = Map::new();
    for (name, path) in env.layout.paths() {
        outln!("{:>16}: {}", name, path.display());
        paths.insert(
            name.to_string(),
            Value::String(path.display().to_string()),
        );
    }
    set_json_output("paths", Value::Object(paths));

    let launch = env.launch_spec();
    outln!("Launch: {}", launch.argv.join(" "));
    set_json_output(
        "launch",
        Value::Array(launch.argv.into_iter().map(Value::String).collect()),
    );

    /* An unreadable record doesn't make the environment incomplete */
    let record = match env.setup_record() {
        Ok(record) => record,
        Err(e) => {
            warn!("Ignoring unreadable setup record: {:#}", e);
            None
        }
    };
    match record {
        Some(record) => {
            outln!("Image: {}", record.image_url);
            outln!("Image sha256: {}", record.image_sha256);
            outln!("Completed at: {}", record.completed_at);
            set_json_output(
                "record",
                serde_json::to_value(&record)
                    .context("Failed to serialize setup record")?,
            );
        }
        None => set_json_output("record", Value::Null),
    }

    Ok(())
}
