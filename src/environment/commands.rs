use super::LinuxEnvironment;
use std::collections::BTreeMap;
use std::path::Path;

/// Loader overrides from the host that break proot when inherited
const SCRUBBED_VARS: [&str; 2] = ["LD_PRELOAD", "LD_LIBRARY_PATH"];

/// Sandbox flags that take no value
const STANDALONE_FLAGS: [&str; 3] = ["--link2symlink", "-0", "-l"];

const GUEST_PATH: &str =
    "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// argv and environment for starting a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl LinuxEnvironment {
    /// Arguments for the sandbox binary, not including the binary itself
    fn sandbox_args(&self) -> Vec<String> {
        let host_storage = self.settings.host_storage.display();
        vec![
            "--link2symlink".into(),
            "-0".into(),
            "-r".into(),
            path_str(&self.layout.rootfs),
            "-b".into(),
            "/dev".into(),
            "-b".into(),
            "/proc".into(),
            "-b".into(),
            "/sys".into(),
            "-b".into(),
            format!("{}:{}", host_storage, host_storage),
            "-b".into(),
            format!("{}:/android", self.settings.data_dir.display()),
            "-w".into(),
            "/root".into(),
            "/bin/sh".into(),
            "-l".into(),
        ]
    }

    /**
     * The sandbox invocation as a plain argv, for callers that can scrub the
     * environment themselves. Runs the same thing as the launcher script.
     */
    pub fn direct_command(&self) -> Vec<String> {
        let mut argv = vec![path_str(&self.layout.sandbox_binary)];
        argv.extend(self.sandbox_args());
        argv
    }

    /// What to run when there is no environment to enter
    pub fn shell_command(&self) -> Vec<String> {
        vec![path_str(&self.settings.host_shell)]
    }

    pub fn environment(&self) -> BTreeMap<String, String> {
        [
            ("HOME", "/root".to_string()),
            ("USER", "root".to_string()),
            ("TERM", "xterm-256color".to_string()),
            ("LANG", "C.UTF-8".to_string()),
            ("PATH", GUEST_PATH.to_string()),
            ("PROOT_TMP_DIR", path_str(&self.layout.tmp_dir)),
            ("PROOT_NO_SECCOMP", "1".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Always goes through the launcher, never the sandbox binary directly
    pub fn launcher_spec(&self) -> LaunchSpec {
        LaunchSpec {
            argv: vec![path_str(&self.layout.launcher_script)],
            env: self.environment(),
        }
    }

    /// The launcher when setup is complete, the host shell otherwise
    pub fn launch_spec(&self) -> LaunchSpec {
        if self.is_setup_complete() {
            self.launcher_spec()
        } else {
            LaunchSpec {
                argv: self.shell_command(),
                env: self.environment(),
            }
        }
    }

    pub fn launcher_script(&self) -> String {
        let mut script = format!("#!{}\n", self.settings.host_shell.display());
        script.push_str("# prootenv launcher, generated during setup\n\n");

        for var in SCRUBBED_VARS {
            script.push_str(&format!("unset {}\n", var));
        }
        script.push('\n');

        script.push_str(&format!(
            "export PROOT_L2S_DIR={}\n",
            quote(&path_str(&self.layout.l2s_dir))
        ));
        script.push_str(&format!(
            "export PROOT_TMP_DIR={}\n",
            quote(&path_str(&self.layout.tmp_dir))
        ));
        script.push_str("export PROOT_NO_SECCOMP=1\n\n");

        script.push_str(&format!(
            "exec {}",
            quote(&path_str(&self.layout.sandbox_binary))
        ));
        let args = self.sandbox_args();
        let mut args = args.iter().peekable();
        while let Some(arg) = args.next() {
            script.push_str(" \\\n    ");
            script.push_str(&quote(arg));
            /* keep flags on the same line as their value */
            if arg.starts_with('-') && !STANDALONE_FLAGS.contains(&arg.as_str())
            {
                if let Some(value) = args.next() {
                    script.push(' ');
                    script.push_str(&quote(value));
                }
            }
        }
        script.push('\n');
        script
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/* Double quote anything a shell might otherwise split or expand */
fn quote(arg: &str) -> String {
    let plain = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/-_.:=,+@".contains(c));
    if plain && !arg.is_empty() {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
