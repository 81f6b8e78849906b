use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None,
    override_usage = "\n    prootenv [OPTIONS] [ACTION] [ACTION_ARGUMENTS...]")]
pub struct Args {
    /**********************/
    /* Flags and settings */
    /**********************/
    /// Set the log level to one of trace, debug, info, warn, or error.
    /// `-v` is shorthand for enabling verbose (trace) logging.
    #[arg(short = 'v',
        long,
        global = true,
        default_missing_value = "trace",
        num_args = 0..=1,
        require_equals = true,
        value_parser = parse_log_level
    )]
    pub log_level: Option<log::LevelFilter>,

    /// Private storage for the environment. The Linux root lives in
    /// `<data-dir>/linux` and the whole directory is visible as /android
    /// inside the sandbox. Defaults to `$XDG_DATA_HOME/prootenv`.
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub data_dir: Option<String>,

    /// Root filesystem image to install. `file://` URLs and absolute paths
    /// are read from disk.
    #[arg(long, global = true)]
    pub image_url: Option<String>,

    /// Expected sha256 of the image, setup fails if it doesn't match
    #[arg(long, global = true)]
    pub image_sha256: Option<String>,

    /// Host instruction set, used to pick the proot binary. Defaults to the
    /// architecture this was built for.
    #[arg(long, global = true)]
    pub arch: Option<String>,

    /// Directory containing bundled assets (proot binaries and the first boot
    /// script). Defaults to `<data-dir>/assets`.
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub assets_dir: Option<String>,

    /// Shared storage bound into the sandbox at the same path. Defaults to
    /// `/sdcard`.
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub host_storage: Option<String>,

    /// Also write diagnostics to this file, replacing it
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub log_file: Option<String>,

    /// Formats action output as a JSON blob. Does nothing for `shell`.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    /// Do not load config files.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub no_config: bool,

    /***************/
    /* Subcommands */
    /***************/
    #[command(subcommand)]
    pub action: Option<Action>,
}

#[derive(clap::Subcommand, Clone, Debug)]
#[command(subcommand_help_heading = "Actions")]
pub enum Action {
    /// Download and install the Linux environment, replacing any existing one
    Setup,

    /// Show whether setup has completed and where everything lives
    Status,

    /// Check that the environment is ready to run a shell
    Validate,

    /// Get current configuration options
    Config {
        /// The keys to get from the configuration
        #[arg(value_name = "KEYS", num_args = 0..)]
        keys: Option<Vec<String>>,
    },

    /// Print the generated launcher script
    Launcher {
        /// Print the equivalent direct argv instead, one argument per line
        #[arg(long)]
        argv: bool,
    },

    /// Open a shell inside the environment, running setup first if needed.
    /// This is the default when no action is given.
    Shell,
}

fn parse_log_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse::<log::LevelFilter>().map_err(|e| e.to_string())
}
