use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Yaml},
};
use wolt_gateway::{Gateway, TraceSink, TracingSink, WriterSink};
use wolt_types::{Coordinates, Endpoints, Result, WoltError};

/// Prefix of environment variables merged over the file configuration.
pub const ENV_PREFIX: &str = "WOLT_";

fn default_locale() -> String {
    "en".to_string()
}
fn default_min_interval_ms() -> i64 {
    300
}
fn default_timeout_secs() -> u64 {
    30
}

/// Where trace lines go when `trace` is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceOutput {
    /// Plain lines on stderr.
    #[default]
    Stderr,
    /// `tracing` debug events under target `wolt::trace`.
    Log,
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Value of the `app-language` header (defaults to `en`).
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Minimum spacing between upstream calls; `<= 0` disables throttling.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: i64,
    /// Overall HTTP timeout per call (defaults to 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Emit per-request trace lines.
    #[serde(default)]
    pub trace: bool,
    #[serde(default)]
    pub trace_output: TraceOutput,
    /// Upstream base URLs; any subset may be overridden.
    #[serde(default)]
    pub endpoints: Endpoints,
    /// Default location for discovery and venue commands.
    #[serde(default)]
    pub location: Option<Coordinates>,
    /// Credential file (defaults to `~/.wolt/credentials.json`).
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            min_interval_ms: default_min_interval_ms(),
            timeout_secs: default_timeout_secs(),
            trace: false,
            trace_output: TraceOutput::Stderr,
            endpoints: Endpoints::default(),
            location: None,
            credentials_path: None,
        }
    }
}

impl Config {
    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    #[cfg(test)]
    #[allow(clippy::result_large_err)]
    pub(crate) fn from_yaml(yaml: &str) -> std::result::Result<Self, figment::Error> {
        Self::defaults().merge(Yaml::string(yaml)).extract()
    }

    /// Defaults, then the YAML file (explicit path, or `~/.wolt/config.yaml`
    /// when present), then `WOLT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if an explicit file is missing or any
    /// layer fails to parse.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, figment::Error> {
        let file = match path {
            Some(p) if !p.is_file() => {
                return Err(format!("config file not found: {}", p.display()).into());
            }
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };
        Self::defaults()
            .merge(Yaml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Credential file location, falling back to the default.
    #[must_use]
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(default_credentials_path)
    }

    /// Builds a gateway configured from this file.
    ///
    /// # Errors
    ///
    /// Returns [`WoltError::Config`] if the HTTP client cannot be built.
    pub fn gateway(&self) -> Result<Gateway> {
        let mut builder = Gateway::builder()
            .endpoints(self.endpoints.clone())
            .locale(self.locale.clone())
            .min_interval_millis(self.min_interval_ms)
            .timeout(Duration::from_secs(self.timeout_secs.max(1)));
        if self.trace {
            builder = builder.trace_sink(self.trace_sink());
        }
        builder.build()
    }

    fn trace_sink(&self) -> Arc<dyn TraceSink> {
        match self.trace_output {
            TraceOutput::Stderr => Arc::new(WriterSink::stderr()),
            TraceOutput::Log => Arc::new(TracingSink),
        }
    }

    /// Location from the config, overridden per axis by `lat`/`lon`.
    ///
    /// # Errors
    ///
    /// Returns [`WoltError::Config`] if neither source provides both axes.
    pub fn coordinates(&self, lat: Option<f64>, lon: Option<f64>) -> Result<Coordinates> {
        let lat = lat.or(self.location.map(|c| c.lat));
        let lon = lon.or(self.location.map(|c| c.lon));
        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(WoltError::Config(
                "no location: set `location` in the config or pass --lat/--lon".into(),
            )),
        }
    }
}

fn home_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".wolt")
}

/// `~/.wolt/config.yaml`
#[must_use]
pub fn default_config_path() -> PathBuf {
    home_dir().join("config.yaml")
}

/// `~/.wolt/credentials.json`
#[must_use]
pub fn default_credentials_path() -> PathBuf {
    home_dir().join("credentials.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use wolt_types::endpoints::{DEFAULT_AUTH_API, DEFAULT_RESTAURANT_API};

    const SAMPLE_YAML: &str = r#"
locale: "fi"
min_interval_ms: 500
trace: true
endpoints:
  consumer_api: "http://127.0.0.1:9100"
location:
  lat: 60.1699
  lon: 24.9384
"#;

    #[test]
    fn test_default_config() {
        let c = Config::default();
        assert_eq!(c.locale, "en");
        assert_eq!(c.min_interval_ms, 300);
        assert_eq!(c.timeout_secs, 30);
        assert!(!c.trace);
        assert!(c.location.is_none());
    }

    #[test]
    fn test_from_yaml_values() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(c.locale, "fi");
        assert_eq!(c.min_interval_ms, 500);
        assert!(c.trace);
        assert_eq!(c.location, Some(Coordinates::new(60.1699, 24.9384)));
    }

    #[test]
    fn test_partial_endpoint_override() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(c.endpoints.consumer_api, "http://127.0.0.1:9100");
        assert_eq!(c.endpoints.restaurant_api, DEFAULT_RESTAURANT_API);
        assert_eq!(c.endpoints.auth, DEFAULT_AUTH_API);
    }

    #[test]
    fn test_negative_interval_disables_throttle() {
        let c = Config::from_yaml("min_interval_ms: -1").unwrap();
        let gw = c.gateway().unwrap();
        assert_eq!(gw.min_interval(), Duration::ZERO);
    }

    #[test]
    fn test_gateway_uses_config() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        let gw = c.gateway().unwrap();
        assert_eq!(gw.locale(), "fi");
        assert_eq!(gw.min_interval(), Duration::from_millis(500));
        assert_eq!(gw.endpoints().consumer_api, "http://127.0.0.1:9100");
    }

    #[test]
    fn test_load_explicit_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"timeout_secs: 5\ntrace_output: log\n").unwrap();
        let c = Config::load(Some(f.path())).unwrap();
        assert_eq!(c.timeout_secs, 5);
        assert_eq!(c.locale, "en");
        assert_eq!(c.trace_output, TraceOutput::Log);
    }

    #[test]
    fn test_trace_output_defaults_to_stderr() {
        let c = Config::from_yaml("trace: true").unwrap();
        assert_eq!(c.trace_output, TraceOutput::Stderr);
        assert!(c.gateway().is_ok());
    }

    /// Records the target of every event.
    struct Targets(Arc<std::sync::Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Targets {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0
                .lock()
                .unwrap()
                .push(event.metadata().target().to_string());
        }
    }

    #[test]
    fn test_trace_output_log_selects_tracing_sink() {
        use tracing_subscriber::layer::SubscriberExt as _;

        let c = Config::from_yaml("trace: true\ntrace_output: log").unwrap();
        let targets = Arc::new(std::sync::Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Targets(targets.clone()));
        tracing::subscriber::with_default(subscriber, || {
            c.trace_sink().write_line("--> GET https://x.test");
        });
        assert_eq!(*targets.lock().unwrap(), vec!["wolt::trace".to_string()]);

        let stderr = Config::from_yaml("trace: true").unwrap();
        let targets = Arc::new(std::sync::Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Targets(targets.clone()));
        tracing::subscriber::with_default(subscriber, || {
            stderr.trace_sink().write_line("--> GET https://x.test");
        });
        assert!(targets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.yaml"))).is_err());
    }

    #[test]
    fn test_coordinates_override() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        let at = c.coordinates(Some(61.5), None).unwrap();
        assert_eq!(at, Coordinates::new(61.5, 24.9384));
        assert!(Config::default().coordinates(Some(1.0), None).is_err());
    }

    #[test]
    fn test_credentials_path_default() {
        let c = Config::default();
        assert!(c.credentials_path().ends_with(".wolt/credentials.json"));
    }
}
