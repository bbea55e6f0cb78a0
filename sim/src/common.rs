//! Shared helpers for the command line front end: logger setup and output path handling.

use std::error::Error;
use std::path::Path;

/// Initialize the logger.
///
/// # Arguments
/// * `log_level` - off, error, warn, info, debug or trace
/// * `log_file` - append to this file instead of stderr
///
/// # Errors
/// Returns an error if the log file cannot be opened or a logger is already installed.
pub fn init_logger(log_level: &str, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level = parse_level(log_level);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        ensure_parent_dir(log_path)?;
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

fn parse_level(log_level: &str) -> log::LevelFilter {
    log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    })
}

/// Create the directory an output file will be written into, if it is missing.
pub fn ensure_parent_dir(output: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Check that a file path ends in `.csv`.
pub fn validate_csv_path(output: &Path) -> Result<(), Box<dyn Error>> {
    match output.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(()),
        _ => Err(format!("Output file '{}' is not a CSV file.", output.display()).into()),
    }
}
