use crate::usecases::u508_sync_remnants::{
    FailurePolicy, RemnantLocation, RetryPolicy, SpreadsheetLayout, SyncSettings,
};
use anyhow::{bail, Context};
use contracts::enums::MarketplaceType;
use contracts::usecases::u508_sync_remnants::{AccountConfig, PaginationStrategy};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub remnants: RemnantsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

/// Откуда и как читать прайс остатков
#[derive(Debug, Deserialize, Clone)]
pub struct RemnantsConfig {
    pub url: Option<String>,
    pub path: Option<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Строк над шапкой листа
    #[serde(default)]
    pub header_row: usize,
    #[serde(default = "default_code_column")]
    pub code_column: String,
    #[serde(default = "default_quantity_column")]
    pub quantity_column: String,
    #[serde(default = "default_price_column")]
    pub price_column: String,
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,
}

fn default_delimiter() -> String {
    ";".to_string()
}

fn default_code_column() -> String {
    "Код".to_string()
}

fn default_quantity_column() -> String {
    "Количество".to_string()
}

fn default_price_column() -> String {
    "Цена".to_string()
}

fn default_archive_extension() -> String {
    ".xls".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub failure_policy: FailurePolicy,
    pub account_concurrency: usize,
    pub upload_concurrency: usize,
    pub account_timeout_seconds: Option<u64>,
    /// Период запуска. Без него синхронизация выполняется один раз.
    pub interval_seconds: Option<u64>,
    pub http_timeout_seconds: u64,
    /// Как часто писать в лог прогресс идущего прогона (0 = не писать)
    pub progress_log_seconds: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::ContinueOnError,
            account_concurrency: 1,
            upload_concurrency: 1,
            account_timeout_seconds: None,
            interval_seconds: None,
            http_timeout_seconds: 30,
            progress_log_seconds: 60,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
        }
    }
}

/// Кабинет в config.toml. Незаданные лимиты берутся по умолчанию для маркетплейса.
#[derive(Debug, Deserialize, Clone)]
pub struct AccountEntry {
    pub marketplace: MarketplaceType,
    pub account_id: String,
    pub label: Option<String>,
    pub warehouse_id: Option<String>,
    pub stock_batch_size: Option<usize>,
    pub price_batch_size: Option<usize>,
    pub page_limit: Option<u32>,
    pub pagination: Option<PaginationStrategy>,
    pub currency: Option<String>,
    /// Переменная окружения с токеном
    pub token_env: Option<String>,
}

impl AccountEntry {
    /// Остатки Яндекс Маркета привязаны к складу, без него `offers/stocks` отвечает 400
    fn require_warehouse(&self) -> anyhow::Result<()> {
        let has_warehouse = self
            .warehouse_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        if self.marketplace == MarketplaceType::YandexMarket && !has_warehouse {
            bail!(
                "account '{}': Yandex Market accounts need warehouse_id",
                self.account_id
            );
        }
        Ok(())
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[remnants]
url = "https://timeworld.ru/upload/files/ostatki.zip"
header_row = 17

[sync]
failure_policy = "continue_on_error"
"#;

/// Переменная, задающая путь к config.toml
pub const CONFIG_ENV: &str = "SYNC_CONFIG";
/// Переменная, переопределяющая URL прайса
pub const REMNANTS_URL_ENV: &str = "REMNANTS_URL";

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Path from $SYNC_CONFIG
/// 2. Next to the executable (for production)
/// 3. Current directory
/// 4. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return load_config_from(Path::new(&path));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join("config.toml"));
        }
    }
    candidates.push(PathBuf::from("config.toml"));

    for config_path in candidates {
        if config_path.exists() {
            return load_config_from(&config_path);
        }
        tracing::debug!("config.toml not found at: {}", config_path.display());
    }

    tracing::info!("Using default embedded configuration");
    parse_config(DEFAULT_CONFIG)
}

pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    tracing::info!("Loading config from: {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config {}", path.display()))
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

fn std_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.remnants.delimiter.len() != 1 {
            bail!(
                "[remnants].delimiter must be a single ASCII character, got '{}'",
                self.remnants.delimiter
            );
        }
        if self.remnants.url.is_some() && self.remnants.path.is_some() {
            bail!("[remnants] must set either url or path, not both");
        }
        if self.sync.account_concurrency == 0 || self.sync.upload_concurrency == 0 {
            bail!("[sync] concurrency settings must be at least 1");
        }

        let mut seen = HashSet::new();
        for entry in &self.accounts {
            if entry.account_id.trim().is_empty() {
                bail!("[[accounts]] entry has an empty account_id");
            }
            if !seen.insert(entry.account_id.as_str()) {
                bail!("account '{}' is configured twice", entry.account_id);
            }
            if entry.stock_batch_size == Some(0)
                || entry.price_batch_size == Some(0)
                || entry.page_limit == Some(0)
            {
                bail!(
                    "account '{}': batch sizes and page limit must be at least 1",
                    entry.account_id
                );
            }
            entry.require_warehouse()?;
        }
        Ok(())
    }

    pub fn remnant_location(&self) -> anyhow::Result<RemnantLocation> {
        self.remnant_location_with(std_env)
    }

    /// Где лежит прайс; $REMNANTS_URL имеет приоритет над файлом конфигурации
    pub fn remnant_location_with<F>(&self, env: F) -> anyhow::Result<RemnantLocation>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = env(REMNANTS_URL_ENV) {
            return Ok(RemnantLocation::Url(url));
        }
        match (&self.remnants.url, &self.remnants.path) {
            (Some(url), _) => Ok(RemnantLocation::Url(url.clone())),
            (None, Some(path)) => Ok(RemnantLocation::Path(PathBuf::from(path))),
            (None, None) => bail!("[remnants] needs url or path"),
        }
    }

    pub fn spreadsheet_layout(&self) -> SpreadsheetLayout {
        let remnants = &self.remnants;
        SpreadsheetLayout {
            delimiter: remnants.delimiter.as_bytes().first().copied().unwrap_or(b';'),
            header_row: remnants.header_row,
            code_column: remnants.code_column.clone(),
            quantity_column: remnants.quantity_column.clone(),
            price_column: remnants.price_column.clone(),
            archive_extension: remnants.archive_extension.clone(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.http_timeout_seconds)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.sync
            .interval_seconds
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs)
    }

    pub fn progress_interval(&self) -> Option<Duration> {
        Some(self.sync.progress_log_seconds)
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        let sync = &self.sync;
        SyncSettings {
            failure_policy: sync.failure_policy,
            account_concurrency: sync.account_concurrency,
            upload_concurrency: sync.upload_concurrency,
            account_timeout: sync.account_timeout_seconds.map(Duration::from_secs),
            retry: RetryPolicy {
                max_attempts: sync.retry_attempts.max(1),
                base_delay: Duration::from_millis(sync.retry_base_delay_ms),
                max_delay: Duration::from_millis(sync.retry_max_delay_ms),
            },
        }
    }

    pub fn resolve_accounts(&self) -> anyhow::Result<Vec<AccountConfig>> {
        self.resolve_accounts_with(std_env)
    }

    /// Кабинеты с токенами из окружения.
    ///
    /// Если `[[accounts]]` не заданы, кабинеты собираются из переменных
    /// CLIENT_ID (Ozon), FBS_ID / DBS_ID и WAREHOUSE_FBS_ID / WAREHOUSE_DBS_ID (Яндекс Маркет).
    pub fn resolve_accounts_with<F>(&self, env: F) -> anyhow::Result<Vec<AccountConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let entries = if self.accounts.is_empty() {
            accounts_from_env(&env)
        } else {
            self.accounts.clone()
        };
        if entries.is_empty() {
            bail!("no accounts configured: add [[accounts]] to config.toml or set CLIENT_ID / FBS_ID / DBS_ID");
        }

        entries
            .into_iter()
            .map(|entry| {
                entry.require_warehouse()?;
                let token_env = entry
                    .token_env
                    .clone()
                    .unwrap_or_else(|| entry.marketplace.default_token_env().to_string());
                let token = env(token_env.as_str()).with_context(|| {
                    format!(
                        "account '{}': token variable {} is not set",
                        entry.account_id, token_env
                    )
                })?;
                Ok(build_account(entry, token))
            })
            .collect()
    }
}

fn build_account(entry: AccountEntry, token: String) -> AccountConfig {
    let mut account = AccountConfig::new(entry.marketplace, entry.account_id).with_token(token);
    if let Some(label) = entry.label {
        account.label = label;
    }
    account.warehouse_id = entry.warehouse_id;
    if let Some(size) = entry.stock_batch_size {
        account.stock_batch_size = size;
    }
    if let Some(size) = entry.price_batch_size {
        account.price_batch_size = size;
    }
    if let Some(limit) = entry.page_limit {
        account.page_limit = limit;
    }
    if let Some(pagination) = entry.pagination {
        account.pagination_strategy = pagination;
    }
    if let Some(currency) = entry.currency {
        account.currency = currency;
    }
    account
}

fn accounts_from_env<F>(env: &F) -> Vec<AccountEntry>
where
    F: Fn(&str) -> Option<String>,
{
    let entry = |marketplace, account_id: String, label: &str, warehouse_id| AccountEntry {
        marketplace,
        account_id,
        label: Some(label.to_string()),
        warehouse_id,
        stock_batch_size: None,
        price_batch_size: None,
        page_limit: None,
        pagination: None,
        currency: None,
        token_env: None,
    };

    let mut entries = Vec::new();
    if let Some(client_id) = env("CLIENT_ID") {
        entries.push(entry(MarketplaceType::Ozon, client_id, "Ozon", None));
    }
    if let Some(campaign_id) = env("FBS_ID") {
        entries.push(entry(
            MarketplaceType::YandexMarket,
            campaign_id,
            "Yandex FBS",
            env("WAREHOUSE_FBS_ID"),
        ));
    }
    if let Some(campaign_id) = env("DBS_ID") {
        entries.push(entry(
            MarketplaceType::YandexMarket,
            campaign_id,
            "Yandex DBS",
            env("WAREHOUSE_DBS_ID"),
        ));
    }
    entries
}
