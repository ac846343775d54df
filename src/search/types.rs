//! Wire types for the label and drug search endpoints.
//!
//! Every field is optional and decoded leniently: a field with an unexpected
//! shape becomes `None` (or empty) instead of failing the whole record.

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::Deserialize;
use serde_json::Value;

use crate::models::{DrugResult, SupplementResult};
use crate::utils::trim_quantity;

/// `GET /api/labels` response body
#[derive(Debug, Deserialize)]
pub struct LabelSearchResponse {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl LabelSearchResponse {
    /// Decode the hits, skipping any that are not label objects
    pub fn into_results(self) -> Vec<SupplementResult> {
        self.items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }
}

/// `GET /api/label` response body (one object, or the first of an array)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDetail {
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub upc_sku: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub entry_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_product_type")]
    pub product_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub serving_sizes: Vec<ServingSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServingSize {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min_quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub notes: Option<String>,
}

impl LabelDetail {
    /// Decode a detail body that may be a bare object or a one-element array
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Array(values) => match values.into_iter().next() {
                Some(first) => serde_json::from_value(first),
                None => Err(serde_json::Error::custom("label response was an empty array")),
            },
            value => serde_json::from_value(value),
        }
    }

    /// First serving formatted as `min[–max] unit (notes)`
    pub fn serving_text(&self) -> Option<String> {
        self.serving_sizes.first().and_then(ServingSize::text)
    }

    pub fn notes_text(&self) -> String {
        let entry = self.entry_date.as_deref();
        match self.upc_sku.as_deref().filter(|s| !s.is_empty()) {
            Some(upc) => format!("upc/sku: {}\nentry date: {}", upc, entry.unwrap_or("—")),
            None => entry.map(|d| format!("entry date: {}", d)).unwrap_or_default(),
        }
    }
}

impl ServingSize {
    pub fn text(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(min) = self.min_quantity {
            match self.max_quantity {
                Some(max) if max != min => {
                    parts.push(format!("{}–{}", trim_quantity(min), trim_quantity(max)))
                }
                _ => parts.push(trim_quantity(min)),
            }
        }
        if let Some(unit) = &self.unit {
            parts.push(unit.clone());
        }
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.is_empty()) {
            parts.push(format!("({})", notes));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// openFDA `drug/label.json` response body
#[derive(Debug, Default, Deserialize)]
pub struct FdaResponse {
    #[serde(default, deserialize_with = "lenient_vec_values")]
    pub results: Vec<Value>,
}

impl FdaResponse {
    pub fn into_results(self) -> Vec<DrugResult> {
        self.results
            .into_iter()
            .filter_map(|v| serde_json::from_value::<FdaLabel>(v).ok())
            .filter_map(FdaLabel::into_result)
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FdaLabel {
    #[serde(default, deserialize_with = "lenient_string")]
    pub set_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_struct")]
    pub openfda: Option<OpenFda>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub dosage_and_administration: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub indications_and_usage: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub description: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub purpose: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub warnings: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub precautions: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub stop_use: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenFda {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub brand_name: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub generic_name: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub manufacturer_name: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub route: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub substance_name: Vec<String>,
}

fn first_text(values: &[String]) -> Option<String> {
    values
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

impl FdaLabel {
    /// Flatten into a display result. Records without any id are dropped.
    pub fn into_result(self) -> Option<DrugResult> {
        let id = self.set_id.or(self.id)?;
        let openfda = self.openfda.unwrap_or_default();

        let brand = first_text(&openfda.brand_name);
        let generic = first_text(&openfda.generic_name);
        let substance = first_text(&openfda.substance_name);
        let title = brand
            .clone()
            .or_else(|| generic.clone())
            .or(substance)
            .unwrap_or_else(|| "Medication".to_string());

        // purpose first so OTC labels lead with it
        let mut notes: Vec<String> = Vec::new();
        for text in [
            self.purpose,
            self.indications_and_usage,
            self.description,
            self.warnings,
            self.precautions,
            self.stop_use,
        ]
        .into_iter()
        .flatten()
        {
            let text = text.trim();
            if !text.is_empty() && !notes.iter().any(|n| n == text) {
                notes.push(text.to_string());
            }
        }

        Some(DrugResult {
            id,
            title,
            brand,
            generic,
            manufacturer: first_text(&openfda.manufacturer_name),
            route: first_text(&openfda.route),
            dosage: first_text(&self.dosage_and_administration),
            detail: notes.first().cloned(),
            notes: notes.join("\n"),
        })
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(values) => values.into_iter().find_map(scalar_to_string),
        other => scalar_to_string(other),
    })
}

pub(crate) fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(values) => values.into_iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    })
}

pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(value).ok_or_else(|| D::Error::custom("id must be a string or number"))
}

pub(crate) fn lenient_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_to_string(Value::deserialize(deserializer)?))
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Product type arrives either as a plain string or as
/// `{ "langualCodeDescription": ... }`
pub(crate) fn lenient_product_type<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Object(mut map) => map
            .remove("langualCodeDescription")
            .and_then(scalar_to_string),
        _ => None,
    })
}

fn lenient_struct<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).ok())
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_vec_values<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values,
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplement_hits_tolerate_odd_fields() {
        let body = br#"{
            "items": [
                {"id": 12345, "fullName": "Fish Oil 1000mg", "brandName": "Nordic", "productType": {"langualCodeDescription": "Fat/Fatty Acid"}},
                {"id": "abc", "fullName": null, "brandName": ["Olly"], "entryDate": 20240101},
                {"fullName": "no id here"},
                "garbage"
            ],
            "total": 4
        }"#;
        let response: LabelSearchResponse = serde_json::from_slice(body).unwrap();
        assert_eq!(response.total, Some(4));
        let results = response.into_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "12345");
        assert_eq!(results[0].product_type.as_deref(), Some("Fat/Fatty Acid"));
        assert_eq!(results[0].subtitle().as_deref(), Some("Nordic • Fat/Fatty Acid"));
        assert_eq!(results[1].display_name(), "(unknown)");
        assert_eq!(results[1].brand_name.as_deref(), Some("Olly"));
        assert_eq!(results[1].entry_date.as_deref(), Some("20240101"));
    }

    #[test]
    fn test_label_detail_object_or_array() {
        let object = br#"{"id": 7, "fullName": "Magnesium", "servingSizes": [{"minQuantity": 2, "maxQuantity": 2, "unit": "Capsule(s)"}]}"#;
        let detail = LabelDetail::from_slice(object).unwrap();
        assert_eq!(detail.id.as_deref(), Some("7"));
        assert_eq!(detail.serving_text().as_deref(), Some("2 Capsule(s)"));

        let array = br#"[{"fullName": "Zinc", "upcSku": "0 12345", "entryDate": "2020-01-01", "productType": {"langualCodeDescription": "Mineral"}}]"#;
        let detail = LabelDetail::from_slice(array).unwrap();
        assert_eq!(detail.full_name.as_deref(), Some("Zinc"));
        assert_eq!(detail.product_type.as_deref(), Some("Mineral"));
        assert_eq!(detail.notes_text(), "upc/sku: 0 12345\nentry date: 2020-01-01");
        assert_eq!(detail.serving_text(), None);

        assert!(LabelDetail::from_slice(b"[]").is_err());
        assert!(LabelDetail::from_slice(b"not json").is_err());
    }

    #[test]
    fn test_serving_range_and_notes() {
        let serving = ServingSize {
            min_quantity: Some(1.0),
            max_quantity: Some(2.5),
            unit: Some("Tablet(s)".to_string()),
            notes: Some("with food".to_string()),
        };
        assert_eq!(serving.text().as_deref(), Some("1–2.5 Tablet(s) (with food)"));
        assert_eq!(ServingSize::default().text(), None);
    }

    #[test]
    fn test_drug_title_fallbacks() {
        let body = br#"{"results": [
            {"set_id": "a", "openfda": {"brand_name": ["Advil"], "generic_name": ["IBUPROFEN"]}},
            {"set_id": "b", "openfda": {"generic_name": ["ibuprofen"]}},
            {"set_id": "c", "openfda": {"substance_name": ["IBUPROFEN"]}},
            {"set_id": "d", "openfda": "not an object"},
            {"openfda": {"brand_name": ["no id"]}}
        ]}"#;
        let response: FdaResponse = serde_json::from_slice(body).unwrap();
        let titles: Vec<String> = response.into_results().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["Advil", "ibuprofen", "IBUPROFEN", "Medication"]);
    }

    #[test]
    fn test_drug_notes_are_trimmed_and_deduplicated() {
        let body = br#"{"results": [{
            "set_id": "x",
            "openfda": {"brand_name": ["Tylenol"], "manufacturer_name": ["Kenvue"], "route": ["ORAL"]},
            "purpose": ["  Pain reliever/fever reducer  "],
            "indications_and_usage": ["Pain reliever/fever reducer", ""],
            "description": 42,
            "warnings": ["Liver warning"],
            "stop_use": "Stop use and ask a doctor if pain gets worse",
            "dosage_and_administration": ["", "take 2 caplets every 6 hours"]
        }]}"#;
        let response: FdaResponse = serde_json::from_slice(body).unwrap();
        let result = response.into_results().remove(0);
        assert_eq!(result.detail.as_deref(), Some("Pain reliever/fever reducer"));
        assert_eq!(
            result.notes,
            "Pain reliever/fever reducer\n42\nLiver warning\nStop use and ask a doctor if pain gets worse"
        );
        assert_eq!(result.dosage.as_deref(), Some("take 2 caplets every 6 hours"));
        assert_eq!(result.route.as_deref(), Some("ORAL"));
        assert_eq!(result.subtitle().as_deref(), Some("Kenvue • ORAL"));
    }

    #[test]
    fn test_missing_results_is_empty() {
        let response: FdaResponse = serde_json::from_slice(br#"{"meta": {}}"#).unwrap();
        assert!(response.into_results().is_empty());
    }
}
