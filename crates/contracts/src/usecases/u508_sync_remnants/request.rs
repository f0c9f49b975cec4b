use serde::{Deserialize, Serialize};

/// Запрос на синхронизацию остатков и цен
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Ограничить запуск указанными кабинетами (None = все из конфигурации)
    #[serde(default)]
    pub account_ids: Option<Vec<String>>,

    /// Посчитать и сверить, но ничего не выгружать
    #[serde(default)]
    pub dry_run: bool,
}
