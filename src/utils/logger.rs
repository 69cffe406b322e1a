//! Terminal logging, adapted from the teacher's `utils::logger`: same
//! `fern`/`colored` dispatch and level-by-verbosity mapping, minus the
//! file-output dispatches (no file I/O in this crate, see `SPEC_FULL.md`
//! §1/§10.1) and plus a virtual-time stamp alongside the wall-clock one,
//! so a log line can be matched against the scheduler time a test asserted.

use colored::*;
use log::{Level, LevelFilter};

use crate::scheduler::current_virtual_time;

pub fn init_logger(app_name: impl AsRef<str>, verbosity: u64) -> Result<(), fern::InitError> {
    let app_name = app_name.as_ref().to_string();

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} vt={:.6} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                current_virtual_time(),
                match record.level() {
                    Level::Error => format!("{}", record.level()).red(),
                    Level::Warn => format!("{}", record.level()).yellow(),
                    Level::Info => format!("{}", record.level()).cyan(),
                    Level::Debug => format!("{}", record.level()).purple(),
                    Level::Trace => format!("{}", record.level()).normal(),
                },
                record.target(),
                message
            ))
        })
        .level(match verbosity {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _4_or_more => LevelFilter::Trace,
        })
        .level_for(app_name, LevelFilter::Trace)
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}
