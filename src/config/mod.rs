use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

pub const GUEST_LANGUAGE: &str = "POLYGLOT_GUEST_LANGUAGE";
pub const ALLOW_ALL_ACCESS: &str = "POLYGLOT_ALLOW_ALL_ACCESS";
pub const LOG_LEVEL: &str = "POLYGLOT_LOG_LEVEL";

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
    warnings: Vec<String>,
}

impl Config {
    pub fn load() -> Self {
        Self::from_sources(default_config_path(), env::vars())
    }

    /// Defaults, then the rc file at `config_path` (if any), then `vars`.
    pub fn from_sources<I>(config_path: PathBuf, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = default_map();
        let mut warnings = Vec::new();

        if config_path.exists() {
            match fs::File::open(&config_path) {
                Ok(file) => read_rc(BufReader::new(file), &mut map, &mut warnings),
                Err(e) => warnings.push(format!("config file is not readable, skipping: {e}")),
            }
        }

        // Environment takes precedence over the file
        for (k, v) in vars {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path, warnings }
    }

    /// Problems met while loading. Loading runs before logging is set up,
    /// so the caller reports these once a subscriber exists.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn language(&self) -> String {
        self.get(GUEST_LANGUAGE).unwrap_or_else(|| "python".into())
    }

    pub fn allow_all_access(&self) -> bool {
        self.get_bool(ALLOW_ALL_ACCESS)
    }

    pub fn log_level(&self) -> String {
        self.get(LOG_LEVEL).unwrap_or_else(|| "warn".into())
    }
}

fn read_rc<R: BufRead>(reader: R, map: &mut HashMap<String, String>, warnings: &mut Vec<String>) {
    for (idx, raw) in reader.split(b'\n').enumerate() {
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                warnings.push(format!("config file read stopped at line {}: {e}", idx + 1));
                break;
            }
        };
        let Ok(line) = String::from_utf8(raw) else {
            warnings.push(format!("config line {} is not valid UTF-8, skipping", idx + 1));
            continue;
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
}

fn is_config_key(k: &str) -> bool {
    k.starts_with("POLYGLOT_")
}

fn default_config_path() -> PathBuf {
    config_dir().join("polyglot_runner").join(".polyglotrc")
}

fn config_dir() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| Path::new("~/.config").to_path_buf())
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert(GUEST_LANGUAGE.into(), "python".into());
    // Guest code gets the core interpreter only unless this is flipped.
    m.insert(ALLOW_ALL_ACCESS.into(), "false".into());
    m.insert(LOG_LEVEL.into(), "warn".into());
    m
}
