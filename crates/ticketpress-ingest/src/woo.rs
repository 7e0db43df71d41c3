// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// WooCommerce order payloads, as delivered by webhooks and returned by
// `GET /wp-json/wc/v3/orders`.
//
// Only the fields we print are modelled.  Money arrives as decimal strings
// ("12.50"); some plugins send bare numbers instead, so both are accepted.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use ticketpress_core::error::{Result, TicketpressError};
use ticketpress_core::types::{LineItem, NewOrder, Variation};

/// Upstream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooOrder {
    pub id: i64,
    /// Customer-facing order number; plugins may make it differ from `id`.
    #[serde(default)]
    pub number: String,
    pub status: String,
    #[serde(default, deserialize_with = "money_text")]
    pub total: Option<String>,
    #[serde(default, deserialize_with = "money_text")]
    pub subtotal: Option<String>,
    #[serde(default, deserialize_with = "money_text")]
    pub shipping_total: Option<String>,
    #[serde(default, deserialize_with = "money_text")]
    pub total_tax: Option<String>,
    #[serde(default)]
    pub customer_note: Option<String>,
    #[serde(default)]
    pub billing: WooBilling,
    #[serde(default)]
    pub line_items: Vec<WooLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WooBilling {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooLineItem {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub quantity: u32,
    #[serde(default, deserialize_with = "money_text")]
    pub total: Option<String>,
    #[serde(default)]
    pub meta_data: Vec<WooMeta>,
}

/// Line item metadata.  Keys starting with `_` are plugin internals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooMeta {
    #[serde(default)]
    pub id: Option<i64>,
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub display_key: Option<String>,
    #[serde(default)]
    pub display_value: Option<serde_json::Value>,
}

fn money_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

/// Parse an optional money field.  Absent or blank is `None`.
fn money(field: &str, raw: Option<&str>) -> Result<Option<Decimal>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(text) => Decimal::from_str(text)
            .map(Some)
            .map_err(|e| TicketpressError::Validation(format!("{field} {text:?}: {e}"))),
    }
}

fn display_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl WooMeta {
    pub fn is_hidden(&self) -> bool {
        self.key.starts_with('_')
    }

    pub fn to_variation(&self) -> Variation {
        let key = self
            .display_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(&self.key);
        let value = self.display_value.as_ref().unwrap_or(&self.value);
        Variation {
            key: key.to_string(),
            value: display_text(value),
        }
    }
}

impl WooLineItem {
    fn to_line_item(&self) -> Result<LineItem> {
        let total = money("line item total", self.total.as_deref())?.ok_or_else(|| {
            TicketpressError::Validation(format!("line item {:?} has no total", self.name))
        })?;
        Ok(LineItem {
            id: self.id,
            name: self.name.clone(),
            quantity: self.quantity,
            total,
            variations: self
                .meta_data
                .iter()
                .filter(|m| !m.is_hidden())
                .map(WooMeta::to_variation)
                .collect(),
        })
    }
}

impl WooOrder {
    /// Normalise into the order we persist and print.
    ///
    /// Fails with `Validation` on a missing or unparsable total and on any
    /// unparsable money field.
    pub fn to_new_order(&self) -> Result<NewOrder> {
        let line_items = self
            .line_items
            .iter()
            .map(WooLineItem::to_line_item)
            .collect::<Result<Vec<_>>>()?;

        let grand_total = money("order total", self.total.as_deref())?.ok_or_else(|| {
            TicketpressError::Validation(format!("order {} has no total", self.id))
        })?;
        let subtotal = match money("subtotal", self.subtotal.as_deref())? {
            Some(subtotal) => subtotal,
            None => line_items.iter().map(|item| item.total).sum(),
        };
        let shipping_total =
            money("shipping total", self.shipping_total.as_deref())?.unwrap_or(Decimal::ZERO);
        let tax_total = money("tax total", self.total_tax.as_deref())?.unwrap_or(Decimal::ZERO);

        let order_number = match self.number.trim() {
            "" => self.id.to_string(),
            number => number.to_string(),
        };
        let customer_name = format!("{} {}", self.billing.first_name, self.billing.last_name)
            .trim()
            .to_string();

        Ok(NewOrder {
            external_id: self.id,
            order_number,
            status: self.status.clone(),
            customer_name,
            customer_email: self
                .billing
                .email
                .clone()
                .filter(|e| !e.trim().is_empty()),
            line_items,
            subtotal,
            shipping_total,
            tax_total,
            grand_total,
            notes: self
                .customer_note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        })
    }
}
