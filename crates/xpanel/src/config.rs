use clap::Parser;

const DEFAULT_DATABASE_URL: &str = "sqlite://./xpanel.db?mode=rwc";

/// Shortest HMAC secret accepted for signing subscription tokens.
pub const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Clone, Parser)]
#[command(name = "xpanel")]
#[command(about = "xpanel subscription server", long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Start the subscription server
    Serve(ServeConfig),

    /// Run database migrations
    Migrate {
        /// Database connection URL
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },

    /// Delete subscription token rows that expired or were revoked long ago
    CleanupTokens {
        /// Database connection URL
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        /// Keep rows younger than this many days
        #[arg(long, default_value = "90")]
        retention_days: i64,
    },

    /// Revoke the active subscription tokens of a user
    RevokeTokens {
        /// Database connection URL
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        #[arg(long)]
        user_id: i64,

        /// Limit revocation to a single subscription
        #[arg(long)]
        subscription_id: Option<i64>,
    },
}

#[derive(Debug, Clone, Parser)]
pub struct ServeConfig {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Server bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:8080")]
    pub bind_address: String,

    /// HMAC secret shared by session and subscription tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Public origin embedded in subscription links (e.g., https://panel.example.com)
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Upper bound on a subscription token's lifetime, in days
    #[arg(long, env = "TOKEN_MAX_LIFETIME_DAYS", default_value = "30")]
    pub token_max_lifetime_days: i64,

    /// Tokens closer than this many days to expiry are flagged as expiring soon
    #[arg(long, env = "TOKEN_WARNING_DAYS", default_value = "7")]
    pub token_warning_days: i64,

    /// Allowed CORS origins (comma-separated)
    #[arg(
        long,
        env = "CORS_ORIGINS",
        default_value = "http://localhost:3000,http://localhost:5173"
    )]
    pub cors_origins: String,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl ServeConfig {
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }
        if self.token_max_lifetime_days <= 0 {
            anyhow::bail!("TOKEN_MAX_LIFETIME_DAYS must be positive");
        }
        if self.token_warning_days < 0 {
            anyhow::bail!("TOKEN_WARNING_DAYS must not be negative");
        }

        let base = url::Url::parse(&self.base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("BASE_URL must be an http(s) URL, got {}", self.base_url);
        }
        Ok(())
    }

    /// `base_url` without a trailing slash.
    pub fn public_base(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }
}
