use anyhow::{bail, Context, Result};
use std::{env, path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub frontend_url: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub max_file_size: usize,
    pub max_image_dimension: u32,
    pub static_dir: PathBuf,
    pub storage: StorageConfig,
    pub timeouts: TimeoutConfig,
    pub reconcile_interval: Option<Duration>,
    pub reconcile_grace: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Local,
    Cloudinary,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub storage_type: StorageType,
    pub local_path: PathBuf,
    pub public_base_url: String,
    pub cloudinary: Option<CloudinaryConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub signature_algorithm: SignatureAlgorithm,
    pub api_base: String,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    pub transform: Duration,
    pub storage: Duration,
    pub database: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            transform: Duration::from_secs(30),
            storage: Duration::from_secs(30),
            database: Duration::from_secs(5),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "memory://".to_string(),
            port: 3000,
            frontend_url: "http://localhost:5173".to_string(),
            jwt_secret: "change-me".to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            max_file_size: 10 * 1024 * 1024,
            max_image_dimension: 4096,
            static_dir: PathBuf::from("./static"),
            storage: StorageConfig {
                storage_type: StorageType::Local,
                local_path: PathBuf::from("./uploads"),
                public_base_url: "http://localhost:3000".to_string(),
                cloudinary: None,
            },
            timeouts: TimeoutConfig::default(),
            reconcile_interval: None,
            reconcile_grace: Duration::from_secs(3600),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL must be set (use memory:// for the in-process store)")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT")?;

        let storage_type = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => StorageType::Local,
            "cloudinary" => StorageType::Cloudinary,
            other => bail!("Unsupported storage backend: {}", other),
        };

        let cloudinary = if storage_type == StorageType::Cloudinary {
            Some(CloudinaryConfig {
                cloud_name: env::var("CLOUDINARY_CLOUD_NAME").context("CLOUDINARY_CLOUD_NAME")?,
                api_key: env::var("CLOUDINARY_API_KEY").context("CLOUDINARY_API_KEY")?,
                api_secret: env::var("CLOUDINARY_API_SECRET").context("CLOUDINARY_API_SECRET")?,
                signature_algorithm: match env::var("CLOUDINARY_SIGNATURE_ALGORITHM")
                    .unwrap_or_else(|_| "sha1".to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "sha1" => SignatureAlgorithm::Sha1,
                    "sha256" => SignatureAlgorithm::Sha256,
                    other => bail!("Unsupported signature algorithm: {}", other),
                },
                api_base: env::var("CLOUDINARY_API_BASE")
                    .unwrap_or_else(|_| "https://api.cloudinary.com/v1_1".to_string()),
            })
        } else {
            None
        };

        let reconcile_interval_secs: u64 = env::var("RECONCILE_INTERVAL_SECS")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .context("RECONCILE_INTERVAL_SECS")?;

        Ok(Config {
            database_url,
            port,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            jwt_secret,
            bcrypt_cost: env::var("BCRYPT_COST")
                .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
                .parse()
                .context("BCRYPT_COST")?,
            max_file_size: env::var("MAX_FILE_SIZE")
                .unwrap_or_else(|_| "10485760".to_string()) // 10MB
                .parse()
                .context("MAX_FILE_SIZE")?,
            max_image_dimension: env::var("MAX_IMAGE_DIMENSION")
                .unwrap_or_else(|_| "4096".to_string())
                .parse()
                .context("MAX_IMAGE_DIMENSION")?,
            static_dir: PathBuf::from(
                env::var("STATIC_DIR").unwrap_or_else(|_| "./static".to_string()),
            ),
            storage: StorageConfig {
                storage_type,
                local_path: PathBuf::from(
                    env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
                ),
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| format!("http://localhost:{}", port)),
                cloudinary,
            },
            timeouts: TimeoutConfig {
                transform: secs_from_env("TRANSFORM_TIMEOUT_SECS", 30)?,
                storage: secs_from_env("STORAGE_TIMEOUT_SECS", 30)?,
                database: secs_from_env("DATABASE_TIMEOUT_SECS", 5)?,
            },
            reconcile_interval: (reconcile_interval_secs > 0)
                .then(|| Duration::from_secs(reconcile_interval_secs)),
            reconcile_grace: secs_from_env("RECONCILE_GRACE_SECS", 3600)?,
        })
    }
}

fn secs_from_env(key: &str, default: u64) -> Result<Duration> {
    let secs: u64 = env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| key.to_string())?;
    Ok(Duration::from_secs(secs))
}
