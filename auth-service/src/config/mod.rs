use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub mfa: MfaConfig,
    pub password: PasswordPolicyConfig,
    pub lockout: LockoutConfig,
    pub bootstrap: BootstrapConfig,
    pub gmail: GmailConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub private_key_path: String,
    pub public_key_path: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
    /// Refresh lifetime granted when the login request set `remember_me`,
    /// capped at 90 days regardless of configuration.
    pub remember_me_refresh_token_expiry_days: i64,
}

/// MFA secret-sealing key. Must decode to exactly 32 bytes (AES-256-GCM).
#[derive(Debug, Clone, Deserialize)]
pub struct MfaConfig {
    pub sealing_key_hex: String,
    pub issuer: String,
}

/// Effective password policy, applied to registration, invitation acceptance
/// and credential resets.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordPolicyConfig {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    pub threshold: u32,
    pub duration_minutes: i64,
}

/// Master user created on first boot when no principals exist yet. The
/// password is never read from configuration directly, only from the
/// environment variable it names, so it never round-trips through a config
/// dump.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub master_username: String,
    pub master_email: String,
    pub master_password_env_var: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailConfig {
    pub user: String,
    pub app_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub admin_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Authenticated,
    Disabled,
}

/// One entry per rate-limit category: `auth` (login/token/refresh),
/// `sensitive` (MFA enroll/verify, password reset), `admin` (tenant/system/
/// audit/impersonation routes) and `general` (everything else). The window
/// is shared across categories; only the per-scope RPM ceilings differ.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitCategory {
    pub user_rpm: u32,
    pub ip_rpm: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_seconds: i64,
    pub auth: RateLimitCategory,
    pub sensitive: RateLimitCategory,
    pub admin: RateLimitCategory,
    pub general: RateLimitCategory,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("auth-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", None, is_prod)?,
            },
            jwt: JwtConfig {
                private_key_path: get_env("JWT_PRIVATE_KEY_PATH", None, is_prod)?,
                public_key_path: get_env("JWT_PUBLIC_KEY_PATH", None, is_prod)?,
                issuer: get_env("JWT_ISSUER", Some("https://auth.internal"), is_prod)?,
                audience: get_env("JWT_AUDIENCE", Some("internal-services"), is_prod)?,
                access_token_expiry_minutes: parse_env("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", "15", is_prod)?,
                refresh_token_expiry_days: parse_env("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "7", is_prod)?,
                remember_me_refresh_token_expiry_days: parse_env("JWT_REMEMBER_ME_REFRESH_TOKEN_EXPIRY_DAYS", "90", is_prod)?,
            },
            mfa: MfaConfig {
                sealing_key_hex: get_env("MFA_SEALING_KEY_HEX", None, true)?,
                issuer: get_env("MFA_ISSUER", Some("auth-service"), is_prod)?,
            },
            password: PasswordPolicyConfig {
                min_length: parse_env("PASSWORD_MIN_LENGTH", "12", is_prod)?,
                require_uppercase: parse_env("PASSWORD_REQUIRE_UPPERCASE", "true", is_prod)?,
                require_lowercase: parse_env("PASSWORD_REQUIRE_LOWERCASE", "true", is_prod)?,
                require_digit: parse_env("PASSWORD_REQUIRE_DIGIT", "true", is_prod)?,
                require_symbol: parse_env("PASSWORD_REQUIRE_SYMBOL", "true", is_prod)?,
            },
            lockout: LockoutConfig {
                threshold: parse_env("LOCKOUT_THRESHOLD", "5", is_prod)?,
                duration_minutes: parse_env("LOCKOUT_DURATION_MINUTES", "30", is_prod)?,
            },
            bootstrap: BootstrapConfig {
                master_username: get_env("BOOTSTRAP_MASTER_USERNAME", Some("admin"), is_prod)?,
                master_email: get_env("BOOTSTRAP_MASTER_EMAIL", Some("admin@auth.internal"), is_prod)?,
                master_password_env_var: get_env("BOOTSTRAP_MASTER_PASSWORD_ENV_VAR", Some("BOOTSTRAP_MASTER_PASSWORD"), is_prod)?,
            },
            gmail: GmailConfig {
                user: get_env("GMAIL_USER", None, is_prod)?,
                app_password: get_env("GMAIL_APP_PASSWORD", None, is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                admin_api_key: get_env("ADMIN_API_KEY", None, true)?,
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                window_seconds: parse_env("RATE_LIMIT_WINDOW_SECONDS", "60", is_prod)?,
                auth: RateLimitCategory {
                    user_rpm: parse_env("RATE_LIMIT_AUTH_USER_RPM", "30", is_prod)?,
                    ip_rpm: parse_env("RATE_LIMIT_AUTH_IP_RPM", "60", is_prod)?,
                },
                sensitive: RateLimitCategory {
                    user_rpm: parse_env("RATE_LIMIT_SENSITIVE_USER_RPM", "10", is_prod)?,
                    ip_rpm: parse_env("RATE_LIMIT_SENSITIVE_IP_RPM", "20", is_prod)?,
                },
                admin: RateLimitCategory {
                    user_rpm: parse_env("RATE_LIMIT_ADMIN_USER_RPM", "60", is_prod)?,
                    ip_rpm: parse_env("RATE_LIMIT_ADMIN_IP_RPM", "120", is_prod)?,
                },
                general: RateLimitCategory {
                    user_rpm: parse_env("RATE_LIMIT_GENERAL_USER_RPM", "300", is_prod)?,
                    ip_rpm: parse_env("RATE_LIMIT_GENERAL_IP_RPM", "600", is_prod)?,
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::Internal(anyhow::anyhow!("PORT must be greater than 0")));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::Internal(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::Internal(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.jwt.remember_me_refresh_token_expiry_days <= 0 {
            return Err(AppError::Internal(anyhow::anyhow!(
                "JWT_REMEMBER_ME_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if hex::decode(&self.mfa.sealing_key_hex).map(|b| b.len()).unwrap_or(0) != 32 {
            return Err(AppError::Internal(anyhow::anyhow!(
                "MFA_SEALING_KEY_HEX must decode to exactly 32 bytes"
            )));
        }

        if self.password.min_length == 0 {
            return Err(AppError::Internal(anyhow::anyhow!("PASSWORD_MIN_LENGTH must be positive")));
        }

        if self.lockout.threshold == 0 {
            return Err(AppError::Internal(anyhow::anyhow!("LOCKOUT_THRESHOLD must be positive")));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::error!("swagger is publicly accessible in production - consider 'authenticated' or 'disabled'");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::Internal(anyhow::anyhow!("{} is required in production but not set", key)))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::Internal(anyhow::anyhow!("{} is required but not set", key)))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError> {
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("{} is not a valid value", key)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "authenticated" => Ok(SwaggerMode::Authenticated),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("invalid swagger mode: {}", s)),
        }
    }
}
