//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{read_config, validate_config, ConfigError, GatewayConfig};

#[derive(Debug, Parser)]
#[command(name = "upload-gateway")]
#[command(about = "HTTP/1.1 gateway with resumable chunked uploads", long_about = None)]
pub struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen port, overriding the port of `listener.bind_address`.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory for upload data and state files.
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Upstream base URL.
    #[arg(short, long)]
    pub upstream: Option<String>,
}

impl Cli {
    /// Load the configuration file (if any), apply overrides and validate.
    pub fn resolve(&self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GatewayConfig::default(),
        };

        if let Some(port) = self.port {
            let host = config
                .listener
                .bind_address
                .rsplit_once(':')
                .map_or("0.0.0.0", |(host, _)| host);
            config.listener.bind_address = format!("{host}:{port}");
        }
        if let Some(dir) = &self.data_dir {
            config.upload.data_dir = dir.clone();
        }
        if let Some(url) = &self.upstream {
            config.upstream.base_url = url.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let cli = Cli::parse_from(["upload-gateway"]);
        assert_eq!(cli.resolve().unwrap(), GatewayConfig::default());
    }

    #[test]
    fn overrides_apply() {
        let cli = Cli::parse_from([
            "upload-gateway",
            "--port",
            "9090",
            "--data-dir",
            "/tmp/uploads",
            "--upstream",
            "http://10.0.0.2:8000",
        ]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:9090");
        assert_eq!(config.upload.data_dir, PathBuf::from("/tmp/uploads"));
        assert_eq!(config.upstream.base_url, "http://10.0.0.2:8000");
    }

    #[test]
    fn file_values_are_validated() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[queue]\ncapacity = 0\n[buffers]\nmax_buffers = 0").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let cli = Cli::parse_from(["upload-gateway", "--config", path.as_str()]);
        match cli.resolve() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn invalid_override_fails_validation() {
        let cli = Cli::parse_from(["upload-gateway", "--upstream", "ftp://nope"]);
        assert!(matches!(cli.resolve(), Err(ConfigError::Validation(_))));
    }
}
