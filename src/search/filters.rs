use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Page size requested from the label search
pub const LABEL_PAGE_SIZE: u32 = 20;

/// Which labels the supplement search includes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LabelStatus {
    All,
    #[default]
    OnMarket,
    OffMarket,
}

impl LabelStatus {
    pub fn as_param(self) -> &'static str {
        match self {
            LabelStatus::All => "2",
            LabelStatus::OnMarket => "1",
            LabelStatus::OffMarket => "0",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    BestMatch,
    Newest,
    NameAsc,
    NameDesc,
}

impl SortOrder {
    /// `(sort_by, sort_order)` query values
    pub fn as_params(self) -> (&'static str, &'static str) {
        match self {
            SortOrder::BestMatch => ("_score", "desc"),
            SortOrder::Newest => ("entryDate", "desc"),
            SortOrder::NameAsc => ("fullName.keyword", "asc"),
            SortOrder::NameDesc => ("fullName.keyword", "desc"),
        }
    }
}

/// Options applied to every supplement search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub status: LabelStatus,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// A normalized supplement query plus the filters it runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplementQuery {
    pub q: String,
    pub filters: SearchFilters,
}

impl SupplementQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let (sort_by, sort_order) = self.filters.sort.as_params();
        let mut pairs = vec![
            ("q", self.q.clone()),
            ("size", LABEL_PAGE_SIZE.to_string()),
            ("status", self.filters.status.as_param().to_string()),
            ("sort_by", sort_by.to_string()),
            ("sort_order", sort_order.to_string()),
        ];
        if let Some(brand) = self.filters.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            pairs.push(("brand", brand.to_string()));
        }
        pairs
    }
}
