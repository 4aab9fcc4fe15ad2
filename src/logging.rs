use std::io::Write;

use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;

/// Maps the number of `-v` flags to a level filter.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the global logger. `RUST_LOG`, when set, takes precedence over
/// the verbosity flags.
pub fn init(verbosity: u8) {
    let mut builder = Builder::new();
    builder
        .filter_level(level_for(verbosity))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        });

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    if let Err(e) = builder.try_init() {
        eprintln!("Failed to initialize logger: {}", e);
    }
}
