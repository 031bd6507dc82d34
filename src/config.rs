use std::env;

pub struct Config {}

impl Config {
    pub fn database_url() -> String {
        env::var("DATABASE_URL").expect("DATABASE_URL must be set")
    }

    pub fn database_pool_size() -> u32 {
        Self::parse_var("DATABASE_POOL_SIZE", 10)
    }

    pub fn database_min_idle() -> u32 {
        Self::parse_var("DATABASE_MIN_IDLE", 1)
    }

    pub fn database_idle_timeout_seconds() -> u64 {
        Self::parse_var("DATABASE_IDLE_TIMEOUT", 300)
    }

    pub fn database_max_lifetime_seconds() -> u64 {
        Self::parse_var("DATABASE_MAX_LIFETIME", 1800)
    }

    pub fn commands_db_pool_number() -> u32 {
        Self::parse_var("COMMANDS_DB_POOL_NUMBER", 5)
    }

    pub fn telegram_bot_token() -> String {
        env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN must be set")
    }

    pub fn telegram_base_url() -> String {
        env::var("TELEGRAM_BASE_URL")
            .unwrap_or_else(|_| "https://api.telegram.org/bot".to_string())
    }

    pub fn telegram_api_id() -> i32 {
        env::var("TELEGRAM_API_ID")
            .expect("TELEGRAM_API_ID must be set")
            .parse()
            .expect("TELEGRAM_API_ID must be an integer")
    }

    pub fn telegram_api_hash() -> String {
        env::var("TELEGRAM_API_HASH").expect("TELEGRAM_API_HASH must be set")
    }

    pub fn telegram_phone() -> String {
        env::var("TELEGRAM_PHONE").expect("TELEGRAM_PHONE must be set")
    }

    pub fn telegram_2fa_password() -> Option<String> {
        env::var("TELEGRAM_2FA_PASSWORD").ok()
    }

    pub fn telegram_login_code() -> Option<String> {
        env::var("TELEGRAM_LOGIN_CODE").ok()
    }

    pub fn telegram_session_path() -> String {
        env::var("TELEGRAM_SESSION_PATH").unwrap_or_else(|_| "./curador.session".to_string())
    }

    pub fn admin_ids() -> Vec<i64> {
        match env::var("ADMIN_IDS") {
            Ok(value) => value
                .split(',')
                .filter_map(|part| part.trim().parse::<i64>().ok())
                .collect(),
            Err(_) => vec![],
        }
    }

    pub fn digest_channel_id() -> Option<i64> {
        env::var("DIGEST_CHANNEL_ID")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
    }

    pub fn rate_limit_rps() -> f64 {
        Self::parse_var("RATE_LIMIT_RPS", 1.0)
    }

    pub fn reader_fetch_limit() -> usize {
        Self::parse_var("READER_FETCH_LIMIT", 50)
    }

    pub fn relevance_threshold() -> f64 {
        Self::parse_var("RELEVANCE_THRESHOLD", 0.5)
    }

    pub fn importance_threshold() -> f64 {
        Self::parse_var("IMPORTANCE_THRESHOLD", 0.5)
    }

    pub fn digest_window_minutes() -> i64 {
        Self::parse_var("DIGEST_WINDOW_MINUTES", 360)
    }

    pub fn health_port() -> u16 {
        Self::parse_var("HEALTH_PORT", 8080)
    }

    pub fn request_timeout_in_seconds() -> u64 {
        Self::parse_var("REQUEST_TIMEOUT", 30)
    }

    pub fn google_api_key() -> Option<String> {
        env::var("GOOGLE_API_KEY").ok()
    }

    pub fn anthropic_api_key() -> Option<String> {
        env::var("ANTHROPIC_API_KEY").ok()
    }

    pub fn openai_api_key() -> Option<String> {
        env::var("OPENAI_API_KEY").ok()
    }

    pub fn google_base_url() -> String {
        env::var("GOOGLE_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string())
    }

    pub fn anthropic_base_url() -> String {
        env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| "https://api.anthropic.com".to_string())
    }

    pub fn openai_base_url() -> String {
        env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string())
    }

    pub fn llm_daily_budget() -> i64 {
        Self::parse_var("LLM_DAILY_BUDGET", 0)
    }

    pub fn expanded_view_base_url() -> Option<String> {
        env::var("EXPANDED_VIEW_BASE_URL").ok()
    }

    pub fn expanded_view_secret() -> Option<String> {
        env::var("EXPANDED_VIEW_SECRET").ok()
    }

    pub fn media_dir() -> String {
        env::var("MEDIA_DIR").unwrap_or_else(|_| "./media".to_string())
    }

    pub fn retention_days() -> i64 {
        Self::parse_var("RETENTION_DAYS", 30)
    }

    pub fn worker_number() -> u32 {
        Self::parse_var("WORKER_NUMBER", 10)
    }

    pub fn pipeline_batch_size() -> i64 {
        Self::parse_var("PIPELINE_BATCH_SIZE", 100)
    }

    fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
        match env::var(name) {
            Ok(value) => value.parse::<T>().unwrap_or(default),
            Err(_) => default,
        }
    }
}
