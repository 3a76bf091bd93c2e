use std::path::PathBuf;

use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: default_storage_root() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { max_bytes: default_max_bytes() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    #[serde(default = "default_frontend_dir")]
    pub dir: PathBuf,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self { dir: default_frontend_dir() }
    }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_storage_root() -> PathBuf { PathBuf::from("data/geojson") }
fn default_max_bytes() -> usize { DEFAULT_MAX_UPLOAD_BYTES }
fn default_frontend_dir() -> PathBuf { PathBuf::from("frontend") }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`), falling back to defaults when the
    /// file is missing, then apply env overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                Some(io) if io.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
                _ => return Err(e),
            },
        };
        cfg.apply_env_overrides();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// `SERVER_HOST`, `SERVER_PORT`, `STORAGE_ROOT`, `UPLOAD_MAX_BYTES` win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Ok(root) = std::env::var("STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(max) = std::env::var("UPLOAD_MAX_BYTES").ok().and_then(|v| v.parse::<usize>().ok()) {
            self.upload.max_bytes = max;
        }
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.validate()?;
        self.upload.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port 必须在 1..=65535 范围内"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(anyhow!("storage.root 不能为空"));
        }
        Ok(())
    }
}

impl UploadConfig {
    fn validate(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Err(anyhow!("upload.max_bytes 必须 >= 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.storage.root, PathBuf::from("data/geojson"));
        assert_eq!(cfg.upload.max_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.frontend.dir, PathBuf::from("frontend"));
    }

    #[test]
    fn sections_override_defaults() {
        let mut cfg = parse(
            r#"
            [server]
            host = ""
            port = 9000
            worker_threads = 0

            [storage]
            root = "/var/lib/geodrop"

            [upload]
            max_bytes = 1024
            "#,
        )
        .unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.worker_threads, Some(4));
        assert_eq!(cfg.storage.root, PathBuf::from("/var/lib/geodrop"));
        assert_eq!(cfg.upload.max_bytes, 1024);
    }

    #[test]
    fn zero_upload_ceiling_rejected() {
        let mut cfg = parse("[upload]\nmax_bytes = 0\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn server_section_with_only_port_parses() {
        let cfg = parse("[server]\nport = 9000\n").unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 9000);

        let cfg = parse("[server]\nhost = \"0.0.0.0\"\n").unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
    }

    // The only test in this crate that touches these variables.
    #[test]
    fn env_overrides_win_over_file() {
        std::env::set_var("SERVER_PORT", "9123");
        std::env::set_var("STORAGE_ROOT", "/srv/geodrop-env");
        std::env::set_var("UPLOAD_MAX_BYTES", "4096");

        let mut cfg = parse("[server]\nport = 9000\n[upload]\nmax_bytes = 1024\n").unwrap();
        cfg.apply_env_overrides();

        std::env::remove_var("SERVER_PORT");
        std::env::remove_var("STORAGE_ROOT");
        std::env::remove_var("UPLOAD_MAX_BYTES");

        assert_eq!(cfg.server.port, 9123);
        assert_eq!(cfg.storage.root, PathBuf::from("/srv/geodrop-env"));
        assert_eq!(cfg.upload.max_bytes, 4096);
    }

    #[test]
    fn zero_port_rejected() {
        let mut cfg = parse("[server]\nhost = \"0.0.0.0\"\nport = 0\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());
    }
}
