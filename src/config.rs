use crate::models::staging::{Retention, StagingConfig};
use crate::services::{digest::DigestAlgorithm, pipeline::IntegrityPolicy, pipeline::LeaseConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Which store the pipeline runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// iRODS through the icommands.
    Irods,
    /// A directory tree plus a SQLite catalog.
    Local,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Log levels accepted by `--log-level`, in the names operators already use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: Backend,
    pub staging: StagingConfig,
    pub retention: Retention,
    pub digest: DigestAlgorithm,
    pub integrity: IntegrityPolicy,
    pub lease: Option<LeaseConfig>,
    /// Objects must end with this to be transformed; `None` accepts any name.
    pub required_extension: Option<String>,
    pub icommands_dir: Option<PathBuf>,
    pub storage_dir: String,
    pub database_url: String,
    pub log_level: LogLevel,
}

/// Settings for `serve`.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// Pipelines allowed to run at once.
    pub workers: usize,
}

impl ServeConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compress an object in place
    Compress {
        /// Logical path of the object
        #[arg(long = "ipath")]
        path: String,
    },
    /// Decompress an object in place
    Decompress {
        /// Logical path of the object
        #[arg(long = "ipath")]
        path: String,
    },
    /// Print an object's decoded metadata as JSON
    Metadata {
        /// Logical path of the object
        #[arg(long = "ipath")]
        path: String,
    },
    /// Run the HTTP worker service
    Serve {
        /// Host to bind to (overrides TRANSCODER_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (overrides TRANSCODER_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Parallel pipelines (overrides TRANSCODER_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Create the local-backend catalog and exit
    Migrate,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Compress and decompress objects in a metadata-tagged object store"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Store backend (overrides TRANSCODER_BACKEND)
    #[arg(long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Remote staging collection (overrides TRANSCODER_ITMP)
    #[arg(long = "itmp", global = true)]
    pub remote_staging: Option<String>,

    /// Local staging directory (overrides TRANSCODER_LOCAL_STAGING)
    #[arg(long, global = true)]
    pub local_staging: Option<PathBuf>,

    /// Remove staging copies once the run finishes
    #[arg(long = "delete-tmp", alias = "delete_tmp", global = true)]
    pub delete_tmp: bool,

    /// Keep the remote staging copies even with --delete-tmp
    #[arg(long, global = true)]
    pub keep_remote_staging: bool,

    /// Keep the local staging copies even with --delete-tmp
    #[arg(long, global = true)]
    pub keep_local_staging: bool,

    /// Digest algorithm for integrity records (overrides TRANSCODER_DIGEST)
    #[arg(long, global = true)]
    pub digest: Option<String>,

    /// What to do when decompressed content fails verification
    #[arg(long, global = true, value_enum)]
    pub integrity: Option<IntegrityPolicy>,

    /// Lease lifetime in seconds; 0 disables leasing (overrides TRANSCODER_LEASE_TTL)
    #[arg(long, global = true)]
    pub lease_ttl: Option<u64>,

    /// Lease owner name (overrides TRANSCODER_LEASE_OWNER)
    #[arg(long, global = true)]
    pub lease_owner: Option<String>,

    /// Required object name extension; empty accepts anything (overrides TRANSCODER_EXTENSION)
    #[arg(long, global = true)]
    pub extension: Option<String>,

    /// Directory holding the icommands (overrides TRANSCODER_ICOMMANDS_DIR)
    #[arg(long, global = true)]
    pub icommands_dir: Option<PathBuf>,

    /// Payload directory of the local backend (overrides TRANSCODER_STORAGE_DIR)
    #[arg(long, global = true)]
    pub storage_dir: Option<String>,

    /// Catalog URL of the local backend (overrides TRANSCODER_DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Log level used when RUST_LOG is unset (overrides TRANSCODER_LOG_LEVEL)
    #[arg(long = "log-level", alias = "logginglevel", global = true, value_enum)]
    pub log_level: Option<LogLevel>,
}

/// Read `name` from the environment, parsing it, or fall back to `default`.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn default_lease_owner() -> String {
    let host = env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into());
    format!("{}-{}", host, std::process::id())
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    /// Merge parsed arguments over the environment. CLI values win.
    pub fn from_args(args: Args) -> Result<Self> {
        let backend = match args.backend {
            Some(backend) => backend,
            None => env_or("TRANSCODER_BACKEND", Backend::Irods)?,
        };

        let remote_dir = match args.remote_staging {
            Some(dir) => dir,
            None => env_or("TRANSCODER_ITMP", "/tempZone/home/rods/itmp".to_string())?,
        };
        let local_dir = match args.local_staging {
            Some(dir) => dir,
            None => env_or(
                "TRANSCODER_LOCAL_STAGING",
                env::temp_dir().join("object-transcoder"),
            )?,
        };

        let mut retention = if args.delete_tmp || env_or("TRANSCODER_DELETE_TMP", false)? {
            Retention::delete_all()
        } else {
            Retention::keep_all()
        };
        retention.keep_remote |= args.keep_remote_staging;
        retention.keep_local |= args.keep_local_staging;

        let digest_name = match args.digest {
            Some(name) => name,
            None => env_or("TRANSCODER_DIGEST", "sha1".to_string())?,
        };
        let digest = digest_name
            .parse::<DigestAlgorithm>()
            .with_context(|| format!("parsing digest `{}`", digest_name))?;

        let integrity = match args.integrity {
            Some(policy) => policy,
            None => match env::var("TRANSCODER_INTEGRITY") {
                Ok(value) => <IntegrityPolicy as ValueEnum>::from_str(&value, true)
                    .map_err(|err| anyhow::anyhow!("parsing TRANSCODER_INTEGRITY: {}", err))?,
                Err(_) => IntegrityPolicy::default(),
            },
        };

        let lease_ttl = match args.lease_ttl {
            Some(ttl) => ttl,
            None => env_or("TRANSCODER_LEASE_TTL", 3600u64)?,
        };
        let lease = if lease_ttl == 0 {
            None
        } else {
            let owner = match args.lease_owner {
                Some(owner) => owner,
                None => env_or("TRANSCODER_LEASE_OWNER", default_lease_owner())?,
            };
            Some(LeaseConfig {
                owner,
                ttl: Duration::from_secs(lease_ttl),
            })
        };

        let extension = match args.extension {
            Some(ext) => ext,
            None => env_or("TRANSCODER_EXTENSION", ".fastq".to_string())?,
        };

        let icommands_dir = match args.icommands_dir {
            Some(dir) => Some(dir),
            None => env::var_os("TRANSCODER_ICOMMANDS_DIR").map(PathBuf::from),
        };

        Ok(Self {
            backend,
            staging: StagingConfig {
                remote_dir,
                local_dir,
            },
            retention,
            digest,
            integrity,
            lease,
            required_extension: (!extension.is_empty()).then_some(extension),
            icommands_dir,
            storage_dir: match args.storage_dir {
                Some(dir) => dir,
                None => env_or("TRANSCODER_STORAGE_DIR", "./data/objects".to_string())?,
            },
            database_url: match args.database_url {
                Some(url) => url,
                None => env_or(
                    "TRANSCODER_DATABASE_URL",
                    "sqlite://./data/meta/catalog.db".to_string(),
                )?,
            },
            log_level: match args.log_level {
                Some(level) => level,
                None => env_or("TRANSCODER_LOG_LEVEL", LogLevel::Info)?,
            },
        })
    }

    /// Whether `path` carries the required extension.
    pub fn accepts(&self, path: &str) -> bool {
        match &self.required_extension {
            Some(ext) => path.ends_with(ext.as_str()),
            None => true,
        }
    }
}

impl ServeConfig {
    pub fn from_args(host: Option<String>, port: Option<u16>, workers: Option<usize>) -> Result<Self> {
        let workers = match workers {
            Some(workers) => workers,
            None => env_or("TRANSCODER_WORKERS", 4usize)?,
        };
        Ok(Self {
            host: match host {
                Some(host) => host,
                None => env_or("TRANSCODER_HOST", "0.0.0.0".to_string())?,
            },
            port: match port {
                Some(port) => port,
                None => env_or("TRANSCODER_PORT", 3000u16)?,
            },
            workers: workers.max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> AppConfig {
        let args = Args::try_parse_from(argv).unwrap();
        AppConfig::from_args(args).unwrap()
    }

    #[test]
    fn cli_flags_build_the_config() {
        let cfg = parse(&[
            "object-transcoder",
            "compress",
            "--ipath",
            "/zone/coll/a.fastq",
            "--itmp",
            "/zone/itmp",
            "--local-staging",
            "/scratch",
            "--delete-tmp",
            "--keep-remote-staging",
            "--digest",
            "SHA256",
            "--integrity",
            "abort",
            "--lease-ttl",
            "0",
            "--extension",
            "",
            "--backend",
            "local",
            "--log-level",
            "WARNING",
        ]);
        assert_eq!(cfg.backend, Backend::Local);
        assert_eq!(cfg.staging.remote_dir, "/zone/itmp");
        assert_eq!(cfg.staging.local_dir, PathBuf::from("/scratch"));
        assert!(cfg.retention.keep_remote);
        assert!(!cfg.retention.keep_local);
        assert_eq!(cfg.digest, DigestAlgorithm::Sha256);
        assert_eq!(cfg.integrity, IntegrityPolicy::Abort);
        assert!(cfg.lease.is_none());
        assert!(cfg.accepts("/zone/coll/anything.txt"));
        assert_eq!(cfg.log_level.directive(), "warn");
    }

    #[test]
    fn extension_filter() {
        let cfg = parse(&[
            "object-transcoder",
            "decompress",
            "--ipath",
            "/c/a.fastq",
            "--extension",
            ".fastq",
            "--lease-ttl",
            "60",
            "--lease-owner",
            "worker-7",
        ]);
        assert!(cfg.accepts("/c/a.fastq"));
        assert!(!cfg.accepts("/c/a.bam"));
        let lease = cfg.lease.unwrap();
        assert_eq!(lease.owner, "worker-7");
        assert_eq!(lease.ttl, Duration::from_secs(60));
    }

    #[test]
    fn unknown_digest_is_rejected() {
        let args = Args::try_parse_from([
            "object-transcoder",
            "metadata",
            "--ipath",
            "/c/a.fastq",
            "--digest",
            "crc32",
        ])
        .unwrap();
        assert!(AppConfig::from_args(args).is_err());
    }
}
