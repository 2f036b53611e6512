use clap::Parser;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser, Debug, Default)]
#[command(name = "cms-hub")]
#[command(about = "File-based CMS with versioned document history")]
pub struct Cli {
    /// Directory holding documents and their history sidecars
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// JSON file mapping usernames to password hashes
    #[arg(long)]
    pub users_file: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    pub addr: Option<String>,

    /// Secret used to sign session tokens
    #[arg(long)]
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub users_file: PathBuf,
    pub addr: String,
    pub jwt_secret: String,
}

impl Config {
    /// Command-line flags win over `CMS_*` environment variables, which win
    /// over built-in defaults.
    pub fn load(cli: Cli) -> Self {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Self {
        let jwt_secret = cli
            .jwt_secret
            .or_else(|| env("CMS_JWT_SECRET"))
            .unwrap_or_else(|| {
                warn!("CMS_JWT_SECRET not set, sessions will not survive a restart");
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(48)
                    .map(char::from)
                    .collect()
            });
        Self {
            data_dir: cli
                .data_dir
                .or_else(|| env("CMS_DATA_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("data")),
            users_file: cli
                .users_file
                .or_else(|| env("CMS_USERS_FILE").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("users.json")),
            addr: cli
                .addr
                .or_else(|| env("CMS_ADDR"))
                .unwrap_or_else(|| "127.0.0.1:3000".to_string()),
            jwt_secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let config = Config::resolve(Cli::default(), |_| None);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.users_file, PathBuf::from("users.json"));
        assert_eq!(config.addr, "127.0.0.1:3000");
        assert_eq!(config.jwt_secret.len(), 48);
    }

    #[test]
    fn flags_override_environment() {
        let env: HashMap<&str, &str> = [
            ("CMS_DATA_DIR", "/srv/docs"),
            ("CMS_ADDR", "0.0.0.0:80"),
            ("CMS_JWT_SECRET", "from-env"),
        ]
        .into_iter()
        .collect();
        let cli = Cli {
            addr: Some("127.0.0.1:9000".into()),
            ..Cli::default()
        };
        let config = Config::resolve(cli, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.data_dir, PathBuf::from("/srv/docs"));
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.jwt_secret, "from-env");
    }
}
