use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/**
 * Logs to stderr, plus an optional plain text diagnostics file. Messages
 * logged before `print_deferred()` are held back so that they can be
 * filtered by the level from the config, which isn't known yet when the
 * logger is installed.
 */
pub struct Logger {
    level: Mutex<LevelFilter>,
    output: Mutex<Box<dyn Write + Send>>,
    file: Mutex<Option<BufWriter<File>>>,
    deferred: Mutex<Vec<(Level, ColoredString, String)>>,
    defer_output: Mutex<bool>,
}

impl Logger {
    pub fn new(level: LevelFilter) -> &'static Self {
        Box::leak(Box::new(Self {
            level: Mutex::new(level),
            output: Mutex::new(Box::new(io::stderr())),
            file: Mutex::new(None),
            deferred: Mutex::new(Vec::new()),
            defer_output: Mutex::new(true),
        }))
    }

    pub fn init(&'static self) -> Result<&'static Self, log::SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(LevelFilter::Trace);
        Ok(self)
    }

    pub fn set_level(&self, level: LevelFilter) {
        *self.level.lock().expect("Failed to lock level") = level;
    }

    /// Start writing to `path` as well, replacing whatever was there
    pub fn open_log_file(&self, path: &Path, data_dir: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(file, "=== prootenv {} ===", env!("CARGO_PKG_VERSION"))?;
        writeln!(file, "Started: {}", chrono::Local::now().to_rfc2822())?;
        writeln!(file, "Data dir: {}", data_dir.display())?;
        writeln!(file)?;
        file.flush()?;
        *self.file.lock().expect("Failed to lock file") = Some(file);
        Ok(())
    }

    pub fn print_deferred(&self) {
        {
            let deferred =
                self.deferred.lock().expect("Failed to lock deferred");
            let level_filter =
                *self.level.lock().expect("Failed to lock level");
            let mut output = self.output.lock().expect("Failed to lock output");
            for (level, message, plain) in deferred.iter() {
                if level <= &level_filter {
                    let _ = writeln!(output, "{}", message);
                    self.write_file(plain);
                }
            }
        }
        self.deferred
            .lock()
            .expect("Failed to lock deferred")
            .clear();
        *self
            .defer_output
            .lock()
            .expect("Failed to lock defer_output") = false;
    }

    /// Flush and close the log file. Later messages only go to stderr.
    pub fn shutdown(&self) {
        self.flush();
        if let Some(mut file) = self.file.lock().expect("Failed to lock file").take()
        {
            let _ = writeln!(
                file,
                "{} === shutdown ===",
                chrono::Local::now().format("%H:%M:%S%.3f")
            );
            let _ = file.flush();
        }
    }

    fn write_file(&self, plain: &str) {
        if let Some(file) = self.file.lock().expect("Failed to lock file").as_mut()
        {
            let _ = writeln!(
                file,
                "{} {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                plain
            );
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= *self.level.lock().expect("Failed to lock level")
    }

    fn log(&self, record: &Record) {
        let (level_str, color) = match record.level() {
            log::Level::Error => {
                (record.level().to_string(), colored::Color::Red)
            }
            log::Level::Warn => {
                (format!("{} ", record.level()), colored::Color::Yellow)
            }
            log::Level::Info => {
                (format!("{} ", record.level()), colored::Color::White)
            }
            log::Level::Debug => {
                (record.level().to_string(), colored::Color::Blue)
            }
            log::Level::Trace => {
                (record.level().to_string(), colored::Color::BrightBlack)
            }
        };
        let plain =
            format!("[{}] {}: {}", level_str, record.target(), record.args());
        let line = format!(
            "[{}] {}: {}",
            level_str.color(color),
            record.target(),
            record.args()
        )
        .color(color);
        if *self
            .defer_output
            .lock()
            .expect("Failed to lock defer_output")
        {
            self.deferred
                .lock()
                .expect("Failed to lock deferred")
                .push((record.level(), line, plain));
        } else if self.enabled(record.metadata()) {
            let mut output = self.output.lock().expect("Failed to lock output");
            let _ = writeln!(output, "{}", line);
            self.write_file(&plain);
        }
    }

    fn flush(&self) {
        let _ = self.output.lock().expect("Failed to lock output").flush();
        if let Some(file) = self.file.lock().expect("Failed to lock file").as_mut()
        {
            let _ = file.flush();
        }
    }
}

/// Log panics, with the thread they happened on, before the default hook runs
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let location = info
            .location()
            .map(|l| format!(" at {}:{}", l.file(), l.line()))
            .unwrap_or_default();
        log::error!(
            "Uncaught panic in thread {}: {}{}",
            thread.name().unwrap_or("<unnamed>"),
            message,
            location
        );
        log::logger().flush();
        previous(info);
    }));
}
