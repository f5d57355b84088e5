use std::{fmt::Debug, io};

use nu_ansi_term::Color::{self, Blue, Cyan, Magenta, Red, Yellow};
use tracing::{field::Field, Event, Level, Metadata, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields, MakeWriter},
    registry::LookupSpan,
    EnvFilter,
};

use crate::{cli::Args, utils::Colored};

/// Environment variable holding filter directives that replace the `-v`/`-q` level.
const LOG_ENV: &str = "STASH_LOG";

/// Fields naming a package, tarball or origin request; highlighted in human output.
const CONTEXT_FIELDS: &[&str] = &["pkg", "tarball", "url", "status"];

#[derive(Default)]
struct EventFields {
    message: String,
    context: Vec<(&'static str, String)>,
    rest: Vec<(&'static str, String)>,
}

impl EventFields {
    fn push(&mut self, name: &'static str, value: String) {
        match name {
            "message" => self.message = value,
            name if CONTEXT_FIELDS.contains(&name) => self.context.push((name, value)),
            name => self.rest.push((name, value)),
        }
    }
}

impl tracing::field::Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.push(field.name(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field.name(), value.to_string());
    }
}

/// Human readable output: level tag, message, context fields, then everything else.
pub struct MirrorFormatter;

impl MirrorFormatter {
    fn tag(level: Level) -> Option<(Color, &'static str)> {
        match level {
            Level::TRACE => Some((Magenta, "[TRACE]")),
            Level::DEBUG => Some((Blue, "[DEBUG]")),
            Level::INFO => None,
            Level::WARN => Some((Yellow, "[WARN]")),
            Level::ERROR => Some((Red, "[ERROR]")),
        }
    }
}

impl<S, N> FormatEvent<S, N> for MirrorFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut fields = EventFields::default();
        event.record(&mut fields);

        if let Some((color, tag)) = Self::tag(*event.metadata().level()) {
            write!(writer, "{} ", Colored(color, tag))?;
        }
        write!(writer, "{}", fields.message)?;
        for (name, value) in &fields.context {
            write!(writer, " {name}={}", Colored(Cyan, value))?;
        }
        for (name, value) in &fields.rest {
            write!(writer, " {name}={value}")?;
        }
        writeln!(writer)
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Collects one formatted event and prints it while progress bars are hidden.
struct EventWriter {
    buffer: Vec<u8>,
    stream: Stream,
}

impl io::Write for EventWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end_matches('\n');
        crate::progress::suspend(|| {
            match self.stream {
                Stream::Stdout => println!("{line}"),
                Stream::Stderr => eprintln!("{line}"),
            }
        });
    }
}

/// Info goes to stdout, every other level to stderr.
struct EventWriters;

impl EventWriters {
    fn open(stream: Stream) -> EventWriter {
        EventWriter {
            buffer: Vec::new(),
            stream,
        }
    }
}

impl<'a> MakeWriter<'a> for EventWriters {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        Self::open(Stream::Stdout)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        if *meta.level() == Level::INFO {
            Self::open(Stream::Stdout)
        } else {
            Self::open(Stream::Stderr)
        }
    }
}

fn filter_level(args: &Args) -> Level {
    match (args.quiet, args.verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// `STASH_LOG` directives when set and valid, `stash=<level>` otherwise.
fn env_filter(args: &Args) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("stash={}", filter_level(args))))
}

pub fn setup_logging(args: &Args) {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter(args))
        .with_writer(EventWriters)
        .with_target(false)
        .without_time();

    let subscriber: Box<dyn Subscriber + Send + Sync> = if args.json {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(builder.event_format(MirrorFormatter).finish())
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use serial_test::serial;

    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(argv)
    }

    #[test]
    fn test_filter_level() {
        let level = |argv: &[&str]| filter_level(&args(argv));
        assert_eq!(level(&["stash", "def-config"]), Level::INFO);
        assert_eq!(level(&["stash", "-v", "def-config"]), Level::DEBUG);
        assert_eq!(level(&["stash", "-vvv", "def-config"]), Level::TRACE);
        assert_eq!(level(&["stash", "-q", "-v", "def-config"]), Level::ERROR);
    }

    #[test]
    #[serial]
    fn test_env_filter_prefers_stash_log() {
        std::env::set_var(LOG_ENV, "stash_operations=trace");
        let filter = env_filter(&args(&["stash", "-q", "def-config"]));
        std::env::remove_var(LOG_ENV);
        assert_eq!(filter.to_string(), "stash_operations=trace");

        let filter = env_filter(&args(&["stash", "-v", "def-config"]));
        assert_eq!(filter.to_string(), "stash=debug");
    }

    #[test]
    fn test_event_fields_split_context() {
        let mut fields = EventFields::default();
        for name in ["message", "pkg", "bytes"] {
            fields.push(name, name.to_uppercase());
        }
        assert_eq!(fields.message, "MESSAGE");
        assert_eq!(fields.context, vec![("pkg", "PKG".to_string())]);
        assert_eq!(fields.rest, vec![("bytes", "BYTES".to_string())]);
    }
}
