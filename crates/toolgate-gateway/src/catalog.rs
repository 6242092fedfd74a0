//! Materials catalog.
//!
//! Both catalog endpoints answer with the same envelope:
//!
//! ```json
//! {"materials": [{"material": {"label": "Plywood", "unit": "sheet",
//!   "cost": "12.50", "purchase": "https://example.org/buy?id=7"}}]}
//! ```
//!
//! Entries are parsed one by one. A malformed entry is skipped with a warning
//! instead of failing the whole list.

#![allow(async_fn_in_trait)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::error::{GatewayError, Result};

/// One consumable sold for use with a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialItem {
    pub label: String,
    pub unit: String,
    /// Price as published by the catalog, kept verbatim for display.
    pub cost: String,
    /// Purchase link. Doubles as the QR payload on the settlement screen.
    pub purchase: String,
    pub image: Option<String>,
}

impl MaterialItem {
    /// Purchase link with `quantity=<n>` appended to its query string.
    ///
    /// Returns `None` if the purchase link is not an absolute URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use toolgate_gateway::MaterialItem;
    ///
    /// let item = MaterialItem {
    ///     label: "Filament".into(),
    ///     unit: "gram".into(),
    ///     cost: "0.05".into(),
    ///     purchase: "https://example.org/buy?id=7".into(),
    ///     image: None,
    /// };
    /// let link = item.purchase_link_with_quantity(6).unwrap();
    /// assert_eq!(link.as_str(), "https://example.org/buy?id=7&quantity=6");
    /// ```
    pub fn purchase_link_with_quantity(&self, quantity: u64) -> Option<Url> {
        let mut url = Url::parse(self.purchase.trim()).ok()?;
        if url.cannot_be_a_base() {
            return None;
        }
        url.query_pairs_mut()
            .append_pair("quantity", &quantity.to_string());
        Some(url)
    }
}

/// Source of material pricing.
pub trait MaterialCatalog: Send {
    /// Consumables listed for a piece of equipment.
    async fn equipment_materials(&mut self, tool_numerical_id: u32) -> Result<Vec<MaterialItem>>;

    /// A single material by catalog ID. `Ok(None)` when the catalog has no entry.
    async fn material(&mut self, material_id: &str) -> Result<Option<MaterialItem>>;
}

/// Parse a catalog response body.
///
/// # Errors
/// Returns `GatewayError::InvalidResponse` if the body is not JSON or has no
/// `materials` list. Individual bad entries are skipped, not reported.
pub fn parse_materials(body: &str) -> Result<Vec<MaterialItem>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::invalid_response(format!("catalog JSON: {e}")))?;

    let entries = value
        .get("materials")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::invalid_response("catalog response has no materials list"))?;

    Ok(entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match parse_entry(entry) {
            Some(item) => Some(item),
            None => {
                warn!(index, "Skipping malformed catalog entry");
                None
            }
        })
        .collect())
}

fn parse_entry(entry: &Value) -> Option<MaterialItem> {
    let material = entry.get("material")?.as_object()?;
    let text = |key: &str| material.get(key)?.as_str().map(str::to_string);

    let cost = match material.get("cost")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    Some(MaterialItem {
        label: text("label")?,
        unit: text("unit")?,
        cost,
        purchase: text("purchase")?,
        image: text("image"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_full_entry() {
        let items = parse_materials(
            r#"{"materials": [{"material": {
                "label": "Plywood 1/4in", "unit": "sheet", "cost": "12.50",
                "purchase": "https://example.org/buy?id=7",
                "image": "https://example.org/img/7.png"}}]}"#,
        )
        .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "Plywood 1/4in");
        assert_eq!(items[0].cost, "12.50");
        assert_eq!(items[0].image.as_deref(), Some("https://example.org/img/7.png"));
    }

    #[rstest]
    #[case(r#"3"#, "3")]
    #[case(r#"0.25"#, "0.25")]
    #[case(r#""$4.00""#, "$4.00")]
    fn test_cost_string_or_number(#[case] raw: &str, #[case] expected: &str) {
        let body = format!(
            r#"{{"materials": [{{"material": {{"label": "A", "unit": "u", "cost": {raw}, "purchase": "https://x.org/p"}}}}]}}"#
        );
        let items = parse_materials(&body).unwrap();
        assert_eq!(items[0].cost, expected);
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let items = parse_materials(
            r#"{"materials": [
                {"material": {"label": "Good", "unit": "g", "cost": 1, "purchase": "https://x.org/a"}},
                {"material": {"label": "No cost", "unit": "g", "purchase": "https://x.org/b"}},
                {"material": {"label": "Bad cost", "unit": "g", "cost": [1], "purchase": "https://x.org/c"}},
                {"material": "not an object"},
                {"other": {}},
                42
            ]}"#,
        )
        .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "Good");
    }

    #[rstest]
    #[case("")]
    #[case("[]")]
    #[case(r#"{"items": []}"#)]
    #[case(r#"{"materials": {}}"#)]
    fn test_unusable_body_is_error(#[case] body: &str) {
        assert!(matches!(
            parse_materials(body),
            Err(GatewayError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_empty_list_is_ok() {
        assert!(parse_materials(r#"{"materials": []}"#).unwrap().is_empty());
    }

    #[rstest]
    #[case("https://example.org/buy?id=7", 6, Some("https://example.org/buy?id=7&quantity=6"))]
    #[case("https://example.org/buy", 5, Some("https://example.org/buy?quantity=5"))]
    #[case("  https://example.org/buy?id=1  ", 0, Some("https://example.org/buy?id=1&quantity=0"))]
    #[case("not a link", 3, None)]
    #[case("mailto:shop@example.org", 3, None)]
    fn test_purchase_link_with_quantity(
        #[case] purchase: &str,
        #[case] quantity: u64,
        #[case] expected: Option<&str>,
    ) {
        let item = MaterialItem {
            label: "Filament".into(),
            unit: "gram".into(),
            cost: "0.05".into(),
            purchase: purchase.into(),
            image: None,
        };
        assert_eq!(
            item.purchase_link_with_quantity(quantity)
                .as_ref()
                .map(Url::as_str),
            expected
        );
    }
}
