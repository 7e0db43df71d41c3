// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Customer receipt layout and the printer test page.
//
// All figures come straight from the order; nothing here sums or recomputes
// a total.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use ticketpress_core::types::{Order, Settings};

use crate::escpos::EscPosBuilder;
use crate::format::{format_currency, format_date_time};

fn store_header(b: &mut EscPosBuilder, settings: &Settings) {
    b.center().bold().double_size();
    b.line(&settings.store_name);
    b.reset_size().bold_off();

    if !settings.store_address.is_empty() {
        b.line(&settings.store_address);
    }
    if !settings.store_phone.is_empty() {
        b.line(&settings.store_phone);
    }
}

/// Render the customer receipt for `order`.
pub fn render(order: &Order, settings: &Settings) -> Vec<u8> {
    let currency = |amount: Decimal| format_currency(amount, &settings.currency_symbol);
    let mut b = EscPosBuilder::new(settings.receipt_width);

    store_header(&mut b, settings);
    b.newline();
    b.separator('=');

    b.left().bold();
    b.line(&format!("Order #{}", order.order_number));
    b.bold_off();
    b.line(&format_date_time(order.created_at, settings.utc_offset_minutes));
    b.newline();
    b.line(&format!("Customer: {}", order.customer_name));
    b.separator('-');
    b.newline();

    for item in &order.line_items {
        b.line_lr(
            &format!("{}x {}", item.quantity, item.name),
            &currency(item.total),
        );
        for variation in &item.variations {
            b.line(&format!("   {}: {}", variation.key, variation.value));
        }
    }

    b.newline();
    b.separator('-');
    b.line_lr("Subtotal:", &currency(order.subtotal));
    if !order.shipping_total.is_zero() {
        b.line_lr("Shipping:", &currency(order.shipping_total));
    }
    if !order.tax_total.is_zero() {
        b.line_lr("Tax:", &currency(order.tax_total));
    }
    b.separator('-');

    b.bold();
    b.line_lr("TOTAL:", &currency(order.grand_total));
    b.bold_off();
    b.newline();

    if let Some(notes) = order.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        b.separator('-');
        b.bold().line("Notes:").bold_off();
        b.line(notes);
        b.newline();
    }

    b.center();
    b.newline();
    b.line(&settings.store_footer);
    b.feed(4);
    b.cut();

    b.build()
}

/// Render the page printed by the settings screen's "test print" action.
///
/// Besides the greeting it states the address and paper width in use, which
/// is what an operator checking a new install wants to see.
pub fn render_test_page(settings: &Settings, now: DateTime<Utc>) -> Vec<u8> {
    let mut b = EscPosBuilder::new(settings.receipt_width);

    store_header(&mut b, settings);
    b.newline();
    b.separator('=');
    b.newline();

    b.line("*** TEST PRINT ***");
    b.newline();
    b.line(&format_date_time(now, settings.utc_offset_minutes));
    b.newline();
    b.line("Printer connection successful!");
    b.newline();

    b.left();
    b.line_lr("Printer:", &format!("{}:{}", settings.printer_ip, settings.printer_port));
    b.line_lr("Paper width:", &format!("{} chars", settings.receipt_width));
    b.center();
    b.separator('=');
    b.newline();
    b.line(&settings.store_footer);
    b.feed(4);
    b.cut();

    b.build()
}
