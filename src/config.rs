use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub blob_base_url: String,
    pub blob_read_write_token: String,
    pub payment_webhook_secret: Option<String>,
    pub email_api_url: String,
    pub email_api_key: Option<String>,
    pub email_from_address: String,
    pub admin_email: String,
    pub whatsapp_api_url: Option<String>,
    pub whatsapp_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            blob_base_url: std::env::var("BLOB_BASE_URL")
                .map_err(|_| anyhow::anyhow!("BLOB_BASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("BLOB_BASE_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("BLOB_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })?,
            blob_read_write_token: std::env::var("BLOB_READ_WRITE_TOKEN")
                .map_err(|_| {
                    anyhow::anyhow!("BLOB_READ_WRITE_TOKEN environment variable required")
                })
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("BLOB_READ_WRITE_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            payment_webhook_secret: std::env::var("PAYMENT_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            email_api_url: std::env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            email_api_key: std::env::var("EMAIL_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            email_from_address: std::env::var("EMAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| "facturen@warmeleads.nl".to_string()),
            admin_email: std::env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "info@warmeleads.nl".to_string()),
            whatsapp_api_url: std::env::var("WHATSAPP_API_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            whatsapp_api_key: std::env::var("WHATSAPP_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Blob store base URL: {}", config.blob_base_url);
        tracing::debug!("Server port: {}", config.port);
        if config.payment_webhook_secret.is_none() {
            tracing::warn!(
                "PAYMENT_WEBHOOK_SECRET not set - webhook signature validation disabled"
            );
        }
        if config.email_api_key.is_none() {
            tracing::warn!("EMAIL_API_KEY not set - order confirmation emails disabled");
        }

        Ok(config)
    }
}
