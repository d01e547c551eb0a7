//! Logging setup: `~/.local/state/rdm/rdm.log`, or stderr when the state dir
//! is not writable.
//!
//! Records carry the thread name (`rdm-job-<id>` for supervisors) and, for
//! anything done on behalf of a job, a `job{id=..}` span that chunk workers
//! inherit, so interleaved transfers can be told apart in one file.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::Span;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::job::JobId;

const DEFAULT_FILTER: &str = "info,rdm_core=debug";

/// Checked before `RUST_LOG`, so the engine's verbosity can be tuned without
/// touching other tools in the same shell.
pub const LOG_ENV: &str = "RDM_LOG";

/// Span for everything done on behalf of job `id`.
pub fn job_span(id: JobId) -> Span {
    tracing::info_span!("job", id = %id)
}

/// Cloned log file handle, or stderr once cloning fails.
enum LogWriter {
    File(fs::File),
    Stderr,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriter::File(f) => f.write(buf),
            LogWriter::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::File(f) => f.flush(),
            LogWriter::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct LogFile(fs::File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogWriter::File)
            .unwrap_or(LogWriter::Stderr)
    }
}

pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rdm")?;
    Ok(xdg_dirs.get_state_home().join("rdm.log"))
}

/// Logs to the XDG state file. Errors when the file cannot be opened, so the
/// caller can fall back to [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    install(BoxMakeWriter::new(LogFile(file)))?;
    tracing::info!(pid = std::process::id(), "rdm logging initialized at {}", path.display());
    Ok(())
}

pub fn init_logging_stderr() {
    let _ = install(BoxMakeWriter::new(io::stderr));
}

fn install(writer: BoxMakeWriter) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_thread_names(true)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialized: {}", e))
}

fn env_filter() -> EnvFilter {
    let directives = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .ok();
    filter_from(directives.as_deref())
}

/// Parses `directives`; anything missing or malformed gets the default filter.
fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn malformed_directives_fall_back_to_default() {
        assert!(filter_from(None).to_string().contains("rdm_core=debug"));
        assert!(filter_from(Some("rdm_core=loud"))
            .to_string()
            .contains("rdm_core=debug"));
        let warn = filter_from(Some("warn")).to_string();
        assert!(warn.contains("warn") && !warn.contains("rdm_core"), "{}", warn);
    }

    #[test]
    fn records_inside_a_job_carry_its_id_and_thread() {
        let out = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(out.clone())
            .with_thread_names(true)
            .with_ansi(false)
            .finish();

        std::thread::Builder::new()
            .name("rdm-job-7".to_string())
            .spawn(move || {
                tracing::subscriber::with_default(subscriber, || {
                    let _job = job_span(JobId(7)).entered();
                    tracing::info!("chunk merged");
                });
            })
            .unwrap()
            .join()
            .unwrap();

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("rdm-job-7"), "{}", text);
        assert!(text.contains("job{id=7}"), "{}", text);
        assert!(text.contains("chunk merged"), "{}", text);
    }
}
