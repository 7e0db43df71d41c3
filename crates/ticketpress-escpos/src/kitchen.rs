// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kitchen ticket layout: large, bold, no prices.

use ticketpress_core::types::{Order, Settings};

use crate::escpos::EscPosBuilder;
use crate::format::format_date_time;

/// Render the kitchen ticket for `order`.
pub fn render(order: &Order, settings: &Settings) -> Vec<u8> {
    let mut b = EscPosBuilder::new(settings.kitchen_width);

    b.newline();

    // Header: order number, customer.
    b.center().bold().double_size();
    b.line("ORDER");
    b.line(&format!("#{}", order.order_number));
    b.reset_size().bold_off();
    b.newline();

    b.separator('=');
    b.newline();
    b.bold().double_size();
    b.line(&order.customer_name.to_uppercase());
    b.reset_size().bold_off();
    b.newline();
    b.separator('=');
    b.newline();
    b.newline();

    for item in &order.line_items {
        b.center().bold().double_size();
        b.line(&format!("{}x", item.quantity));
        b.newline();
        b.line(&item.name.to_uppercase());
        b.reset_size().bold_off();

        if !item.variations.is_empty() {
            b.newline();
            for variation in &item.variations {
                b.bold().double_height();
                b.line(&format!("> {}", variation.value.to_uppercase()));
                b.reset_size().bold_off();
            }
        }

        b.newline();
        b.separator('-');
        b.newline();
    }

    if let Some(notes) = order.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        b.newline();
        b.center().bold().double_size();
        b.line("** NOTES **");
        b.newline();
        b.line(&notes.to_uppercase());
        b.reset_size().bold_off();
        b.newline();
    }

    b.newline();
    b.separator('=');
    b.center().bold();
    b.line(&format!(
        "ORDERED: {}",
        format_date_time(order.created_at, settings.utc_offset_minutes)
    ));
    b.bold_off();
    b.separator('=');

    b.feed(5);
    b.cut();

    b.build()
}
