use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::search::types::{LabelDetail, lenient_id, lenient_product_type, lenient_string};
use crate::utils::join_bits;

/// Time of day an item is taken. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 3] = [TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Evening];

    pub fn title(self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" | "am" => Ok(TimeOfDay::Morning),
            "afternoon" | "noon" => Ok(TimeOfDay::Afternoon),
            "evening" | "pm" | "night" => Ok(TimeOfDay::Evening),
            other => Err(format!("Unknown time of day: {}", other)),
        }
    }
}

/// A tracked medication or supplement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(default, alias = "labelID", skip_serializing_if = "Option::is_none")]
    pub label_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_text: Option<String>,
    pub time_of_day: TimeOfDay,
    #[serde(default)]
    pub checked: bool,
}

impl Item {
    /// Create an unchecked item with a fresh id
    pub fn new(name: impl Into<String>, time_of_day: TimeOfDay) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label_id: None,
            name: name.into(),
            brand: None,
            dose_text: None,
            time_of_day,
            checked: false,
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_dose(mut self, dose: impl Into<String>) -> Self {
        self.dose_text = Some(dose.into());
        self
    }

    pub fn with_label(mut self, label_id: impl Into<String>) -> Self {
        self.label_id = Some(label_id.into());
        self
    }

    pub fn from_supplement(result: &SupplementResult, time_of_day: TimeOfDay) -> Self {
        let mut item = Item::new(result.display_name(), time_of_day).with_label(result.id.clone());
        item.brand = result.brand_name.clone();
        item
    }

    pub fn from_drug(result: &DrugResult, time_of_day: TimeOfDay) -> Self {
        let mut item = Item::new(result.title.clone(), time_of_day).with_label(result.id.clone());
        item.brand = result.manufacturer.clone();
        item.dose_text = result.dosage.as_deref().map(first_line);
        item
    }

    pub fn from_label_detail(detail: &LabelDetail, time_of_day: TimeOfDay) -> Self {
        let name = detail.full_name.clone().unwrap_or_else(|| "label".to_string());
        let mut item = Item::new(name, time_of_day);
        item.label_id = detail.id.clone();
        item.brand = detail.brand_name.clone();
        item.dose_text = detail.serving_text();
        item
    }

    /// Brand and dose joined for a list row
    pub fn subtitle(&self) -> Option<String> {
        join_bits([self.brand.as_deref(), self.dose_text.as_deref()])
    }
}

fn first_line(text: &str) -> String {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("").to_string()
}

/// Group items by time of day, each group sorted by name (case-insensitive)
pub fn group_by_time(items: &[Item]) -> Vec<(TimeOfDay, Vec<Item>)> {
    TimeOfDay::ALL
        .iter()
        .map(|&tod| {
            let mut group: Vec<Item> = items.iter().filter(|i| i.time_of_day == tod).cloned().collect();
            group.sort_by_key(|i| i.name.to_lowercase());
            (tod, group)
        })
        .collect()
}

/// One hit from the supplement label search
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplementResult {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub entry_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_product_type")]
    pub product_type: Option<String>,
}

impl SupplementResult {
    pub fn display_name(&self) -> String {
        self.full_name.clone().unwrap_or_else(|| "(unknown)".to_string())
    }

    pub fn subtitle(&self) -> Option<String> {
        join_bits([self.brand_name.as_deref(), self.product_type.as_deref()])
    }
}

/// One hit from the drug label search, flattened for display
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrugResult {
    pub id: String,
    pub title: String,
    pub brand: Option<String>,
    pub generic: Option<String>,
    pub manufacturer: Option<String>,
    pub route: Option<String>,
    pub dosage: Option<String>,
    /// First non-empty note line
    pub detail: Option<String>,
    pub notes: String,
}

impl DrugResult {
    /// Title plus the generic name when it adds something
    pub fn headline(&self) -> String {
        match self.generic.as_deref() {
            Some(generic) if !generic.eq_ignore_ascii_case(&self.title) => {
                format!("{} ({})", self.title, generic)
            }
            _ => self.title.clone(),
        }
    }

    pub fn subtitle(&self) -> Option<String> {
        join_bits([
            self.generic.as_deref(),
            self.manufacturer.as_deref(),
            self.route.as_deref(),
        ])
    }
}
