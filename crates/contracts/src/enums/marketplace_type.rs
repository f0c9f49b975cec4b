use serde::{Deserialize, Serialize};

/// Маркетплейсы, каталоги которых синхронизируются с остатками
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketplaceType {
    Ozon,
    YandexMarket,
}

impl MarketplaceType {
    /// Получить код маркетплейса
    pub fn code(&self) -> &'static str {
        match self {
            MarketplaceType::Ozon => "mp-ozon",
            MarketplaceType::YandexMarket => "mp-ym",
        }
    }

    /// Получить человекочитаемое название
    pub fn display_name(&self) -> &'static str {
        match self {
            MarketplaceType::Ozon => "Ozon",
            MarketplaceType::YandexMarket => "Яндекс Маркет",
        }
    }

    /// Получить все типы маркетплейсов
    pub fn all() -> Vec<MarketplaceType> {
        vec![MarketplaceType::Ozon, MarketplaceType::YandexMarket]
    }

    /// Парсинг из строки (код или snake_case имя)
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "mp-ozon" | "ozon" => Some(MarketplaceType::Ozon),
            "mp-ym" | "yandex_market" => Some(MarketplaceType::YandexMarket),
            _ => None,
        }
    }

    /// Переменная окружения с токеном по умолчанию
    pub fn default_token_env(&self) -> &'static str {
        match self {
            MarketplaceType::Ozon => "SELLER_TOKEN",
            MarketplaceType::YandexMarket => "MARKET_TOKEN",
        }
    }

    /// Код валюты, который ожидает API маркетплейса
    pub fn default_currency(&self) -> &'static str {
        match self {
            MarketplaceType::Ozon => "RUB",
            MarketplaceType::YandexMarket => "RUR",
        }
    }
}

impl std::fmt::Display for MarketplaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
