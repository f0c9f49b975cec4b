use serde::{Deserialize, Serialize};

/// Строка остатков из прайса поставщика.
///
/// Поля уже провалидированы при загрузке (непустые, без пробелов по краям),
/// интерпретация количества и цены выполняется при сверке с каталогом.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemnantRecord {
    /// Код товара (совпадает с артикулом продавца на маркетплейсе)
    pub code: String,
    /// Количество как в прайсе: "5", "1", ">10"
    pub quantity_descriptor: String,
    /// Цена как в прайсе: "5'990.00 руб."
    pub price_text: String,
}

impl RemnantRecord {
    pub fn new(
        code: impl Into<String>,
        quantity_descriptor: impl Into<String>,
        price_text: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            quantity_descriptor: quantity_descriptor.into(),
            price_text: price_text.into(),
        }
    }
}
