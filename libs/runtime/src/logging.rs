//! Subscriber setup: one console layer and one JSON file layer per
//! logging section, with the `default` section catching every target
//! that no named section claims.

use crate::config::{LoggingConfig, Section};
use crate::paths::resolve_under;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    io::{self, IsTerminal, Write},
    path::Path,
    sync::Arc,
};
use tracing::{level_filters::LevelFilter, Level, Metadata};
use tracing_subscriber::{
    filter::{FilterFn, Targets},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer, Registry,
};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `None` disables the sink; unknown names fall back to INFO.
fn level_from_str(s: &str) -> Option<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => None,
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => Some(Level::INFO),
    }
}

/// `users_info` owns `users_info` and `users_info::*`, not `users_info_ext`.
fn target_in(target: &str, section: &str) -> bool {
    target
        .strip_prefix(section)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// -------- file sinks --------

type SharedFile = Arc<Mutex<FileRotate<AppendTimestamp>>>;

/// Writer for one record; `None` swallows the bytes.
struct SinkWriter(Option<SharedFile>);

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.0 {
            Some(file) => file.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &self.0 {
            Some(file) => file.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Picks the log file for a record by its target.
#[derive(Clone, Default)]
struct FileSinks {
    fallback: Option<SharedFile>,
    named: HashMap<String, SharedFile>,
}

impl FileSinks {
    fn open(sections: &Sections<'_>, base_dir: &Path) -> Self {
        let fallback = sections
            .fallback
            .and_then(|s| open_section_file(DEFAULT_SECTION, s, base_dir));
        let named = sections
            .named
            .iter()
            .filter_map(|(name, s)| open_section_file(name, s, base_dir).map(|f| (name.clone(), f)))
            .collect();
        Self { fallback, named }
    }

    fn file_for(&self, target: &str) -> Option<SharedFile> {
        self.named
            .iter()
            .find(|(name, _)| target_in(target, name))
            .map(|(_, f)| f)
            .or(self.fallback.as_ref())
            .cloned()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileSinks {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter(self.fallback.clone())
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SinkWriter(self.file_for(meta.target()))
    }
}

/// Rotating file at `path`; parent directories are created as needed.
fn open_rotating(path: &Path, max_bytes: usize, max_files: usize) -> io::Result<SharedFile> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = FileRotate::new(
        path,
        AppendTimestamp::default(FileLimit::MaxFiles(max_files)),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(Arc::new(Mutex::new(file)))
}

fn open_section_file(name: &str, section: &Section, base_dir: &Path) -> Option<SharedFile> {
    if section.file.trim().is_empty() {
        return None;
    }

    let path = resolve_under(&section.file, base_dir);
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let max_files = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);

    open_rotating(&path, max_bytes as usize, max_files)
        .map_err(|e| {
            // No subscriber yet; stderr is the only place this can go.
            eprintln!("log file for '{name}' at {} unavailable: {e}", path.display());
        })
        .ok()
}

// -------- filters --------

struct Sections<'a> {
    fallback: Option<&'a Section>,
    named: Vec<(String, &'a Section)>,
}

impl<'a> Sections<'a> {
    fn split(cfg: &'a LoggingConfig) -> Self {
        Self {
            fallback: cfg.get(DEFAULT_SECTION),
            named: cfg
                .iter()
                .filter(|(k, _)| k.as_str() != DEFAULT_SECTION)
                .map(|(k, v)| (k.clone(), v))
                .collect(),
        }
    }

    /// Named sections at the level `pick` selects; every other target is off.
    fn named_targets(&self, pick: impl Fn(&Section) -> Option<&str>) -> Targets {
        self.named
            .iter()
            .filter_map(|(name, s)| {
                let level = pick(s).and_then(level_from_str)?;
                Some((name.clone(), LevelFilter::from_level(level)))
            })
            .fold(Targets::new().with_default(LevelFilter::OFF), |t, (name, lvl)| {
                t.with_target(name, lvl)
            })
    }

    /// Targets no named section claims, up to `max`.
    fn unclaimed(&self, max: Level) -> FilterFn<impl Fn(&Metadata<'_>) -> bool> {
        let claimed: Vec<String> = self.named.iter().map(|(n, _)| n.clone()).collect();
        FilterFn::new(move |meta: &Metadata<'_>| {
            *meta.level() <= max && !claimed.iter().any(|n| target_in(meta.target(), n))
        })
    }
}

fn console_layer<F>(ansi: bool, filter: F) -> BoxedLayer
where
    F: tracing_subscriber::layer::Filter<Registry> + Send + Sync + 'static,
{
    fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(filter)
        .boxed()
}

fn json_file_layer<F>(sinks: FileSinks, filter: F) -> BoxedLayer
where
    F: tracing_subscriber::layer::Filter<Registry> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(sinks)
        .with_filter(filter)
        .boxed()
}

fn build_layers(sections: &Sections<'_>, sinks: FileSinks, ansi: bool) -> Vec<BoxedLayer> {
    let mut layers = vec![console_layer(
        ansi,
        sections.named_targets(|s| Some(s.console_level.as_str())),
    )];

    if !sinks.named.is_empty() {
        let files = sections.named_targets(|s| {
            (!s.file.trim().is_empty()).then_some(s.file_level.as_str())
        });
        layers.push(json_file_layer(sinks.clone(), files));
    }

    if let Some(fallback) = sections.fallback {
        if let Some(level) = level_from_str(&fallback.console_level) {
            layers.push(console_layer(ansi, sections.unclaimed(level)));
        }
        if sinks.fallback.is_some() {
            if let Some(level) = level_from_str(&fallback.file_level) {
                layers.push(json_file_layer(sinks, sections.unclaimed(level)));
            }
        }
    }

    layers
}

// -------- public init --------

/// Install the global subscriber described by `cfg`.
///
/// Relative log file paths resolve against `base_dir` (server.home_dir).
/// An empty map installs a plain console subscriber. Calling this twice is
/// harmless; the first subscriber wins.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = fmt()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let sections = Sections::split(cfg);
    let sinks = FileSinks::open(&sections, base_dir);
    let layers = build_layers(&sections, sinks, io::stdout().is_terminal());

    let _ = Registry::default().with(layers).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_logging_config;
    use tempfile::tempdir;

    fn section(file: &str) -> Section {
        Section {
            console_level: "warn".into(),
            file: file.into(),
            file_level: "debug".into(),
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn level_names_are_case_insensitive_and_lenient() {
        assert_eq!(level_from_str(" Debug "), Some(Level::DEBUG));
        assert_eq!(level_from_str("WARNING"), Some(Level::WARN));
        assert_eq!(level_from_str("OFF"), None);
        assert_eq!(level_from_str("verbose"), Some(Level::INFO));
    }

    #[test]
    fn section_owns_its_module_paths_only() {
        assert!(target_in("users_info", "users_info"));
        assert!(target_in("users_info::infra::storage::json_store", "users_info"));
        assert!(!target_in("users_info_ext", "users_info"));
        assert!(!target_in("api_ingress::request_id", "users_info"));
    }

    #[test]
    fn default_key_is_split_from_named_sections() {
        let mut cfg = default_logging_config();
        cfg.insert("users_info".into(), section("logs/users.log"));

        let sections = Sections::split(&cfg);
        assert!(sections.fallback.is_some());
        assert_eq!(sections.named.len(), 1);
        assert_eq!(sections.named[0].0, "users_info");
    }

    #[test]
    fn records_go_to_their_section_file_or_the_default() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert(DEFAULT_SECTION.into(), section("logs/userapi.log"));
        cfg.insert("users_info".into(), section("logs/users.log"));
        cfg.insert("api_ingress".into(), section(""));

        let sinks = FileSinks::open(&Sections::split(&cfg), tmp.path());

        assert_eq!(sinks.named.len(), 1, "an empty file name disables the sink");
        let users = sinks.file_for("users_info::domain::service").unwrap();
        let ingress = sinks.file_for("api_ingress").unwrap();
        assert!(Arc::ptr_eq(&users, &sinks.named["users_info"]));
        assert!(Arc::ptr_eq(&ingress, sinks.fallback.as_ref().unwrap()));
    }

    #[test]
    fn rotating_file_creates_missing_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("a/b/userapi.log");

        let file = open_rotating(&path, 64 * 1024, 2).unwrap();
        file.lock().write_all(b"hello\n").unwrap();
        file.lock().flush().unwrap();

        assert!(path.is_file());
    }

    #[test]
    fn layers_follow_configured_sinks() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert(DEFAULT_SECTION.into(), section(""));
        cfg.insert("users_info".into(), section("logs/users.log"));

        let sections = Sections::split(&cfg);
        let sinks = FileSinks::open(&sections, tmp.path());
        // console for named, file for named, console for default; no default file
        assert_eq!(build_layers(&sections, sinks, false).len(), 3);
    }
}
