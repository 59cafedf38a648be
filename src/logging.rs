use indicatif::MultiProgress;
use owo_colors::{OwoColorize, Stream, Style};

/// Padded label and terminal style for a log level.
fn level_style(level: log::Level) -> (&'static str, Style) {
    match level {
        log::Level::Error => ("ERROR", Style::new().red()),
        log::Level::Warn => ("WARN ", Style::new().yellow()),
        log::Level::Info => ("INFO ", Style::new().green()),
        log::Level::Debug => ("DEBUG", Style::new().cyan()),
        log::Level::Trace => ("TRACE", Style::new().magenta()),
    }
}

/// Default filter for the given verbosity flags. `RUST_LOG` still wins.
fn default_level(quiet: bool, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

/// `[LEVEL] message`, coloured when stderr is a terminal.
fn format_line(level: log::Level, args: &std::fmt::Arguments) -> String {
    let (label, style) = level_style(level);
    format!(
        "[{}] {args}",
        label.if_supports_color(Stream::Stderr, |l| l.style(style))
    )
}

/// Logger that prints through a [`MultiProgress`] so lines never tear a progress bar.
struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            let line = format_line(record.level(), record.args());
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the logger and return the [`MultiProgress`] that progress bars must be added to.
pub fn init(quiet: bool, debug: bool) -> MultiProgress {
    let multi = MultiProgress::new();
    let inner = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level(quiet, debug)),
    )
    .build();
    let max_level = inner.filter();
    log::set_boxed_logger(Box::new(IndicatifLogger {
        inner,
        multi: multi.clone(),
    }))
    .expect("failed to init logger");
    log::set_max_level(max_level);
    multi
}
