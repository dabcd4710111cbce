use burrow_gateway::JwtConfig;
use burrow_storage::StorageConfig;
use burrow_telemetry::LogFormat;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const LISTEN_ADDR_ENV: &str = "BURROW_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "BURROW_BASE_URL";
pub const DATABASE_DSN_ENV: &str = "BURROW_DATABASE_DSN";
pub const FILE_STORAGE_PATH_ENV: &str = "BURROW_FILE_STORAGE_PATH";
pub const JWT_SECRET_ENV: &str = "BURROW_JWT_SECRET";
pub const LOG_FORMAT_ENV: &str = "BURROW_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Parser)]
#[command(name = "burrow-gateway")]
pub struct Cli {
    #[arg(short = 'a', long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix of the short links handed back to clients.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// PostgreSQL connection string; takes precedence over the file log.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// JSON-lines log used when no database is configured.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    #[arg(long, env = JWT_SECRET_ENV, hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = LOG_FORMAT_ENV, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            database_dsn: self.database_dsn.clone(),
            file_path: self.file_storage_path.clone(),
        }
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::builder().secret(self.jwt_secret.as_str()).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_storage::Backend;

    #[test]
    fn defaults_to_memory_storage() {
        let cli = Cli::try_parse_from(["gateway", "--jwt-secret", "s3cret"]).unwrap();

        assert_eq!(cli.listen_addr, DEFAULT_LISTEN_ADDR.parse().unwrap());
        assert_eq!(cli.base_url, DEFAULT_BASE_URL);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.storage_config().backend(), Backend::Memory);
    }

    #[test]
    fn database_wins_over_file() {
        let cli = Cli::try_parse_from([
            "gateway",
            "--jwt-secret",
            "s3cret",
            "-f",
            "/tmp/urls.jsonl",
            "-d",
            "postgres://localhost/burrow",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert!(matches!(cli.storage_config().backend(), Backend::Postgres(_)));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn jwt_secret_is_required() {
        assert!(Cli::try_parse_from(["gateway"]).is_err());
    }
}
