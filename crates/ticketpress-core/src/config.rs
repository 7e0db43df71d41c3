// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Loaded once at startup from a JSON file.  Secrets and the printer address
// may be overridden from the environment so they never need to live in the
// file on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::Settings;

/// Credentials for the upstream WooCommerce REST API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WooCommerceConfig {
    /// Shop base URL, e.g. `https://shop.example.com`.
    pub url: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
}

impl WooCommerceConfig {
    /// True when all three values are present.
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.consumer_key.is_some() && self.consumer_secret.is_some()
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP API binds to.
    pub listen_addr: String,
    /// SQLite database holding orders, print jobs and settings.
    pub database_path: PathBuf,
    /// SQLite database for the webhook delivery log.
    pub webhook_log_path: PathBuf,
    /// Shared secret for webhook HMAC signatures.  `None` rejects every push.
    pub webhook_secret: Option<String>,
    pub woocommerce: WooCommerceConfig,
    /// Upstream statuses that produce print jobs.
    pub printable_statuses: Vec<String>,
    pub poll_interval_secs: u64,
    /// Jobs stuck in `processing` longer than this are requeued.
    pub stale_after_secs: u64,
    /// Seed for the settings row on first start.
    pub printer: Settings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".into(),
            database_path: PathBuf::from("ticketpress.db"),
            webhook_log_path: PathBuf::from("webhooks.db"),
            webhook_secret: None,
            woocommerce: WooCommerceConfig::default(),
            printable_statuses: vec!["processing".into(), "on-hold".into()],
            poll_interval_secs: 60,
            stale_after_secs: 300,
            printer: Settings::default(),
        }
    }
}

impl AppConfig {
    /// Load the config file at `path`, falling back to defaults when the
    /// file does not exist, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: AppConfig = serde_json::from_str(&data)?;
            info!(path = %path.display(), "configuration loaded");
            config
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            AppConfig::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("WEBHOOK_SECRET") {
            self.webhook_secret = Some(secret);
        }
        if let Some(url) = lookup("WOOCOMMERCE_URL") {
            self.woocommerce.url = Some(url);
        }
        if let Some(key) = lookup("WOOCOMMERCE_KEY") {
            self.woocommerce.consumer_key = Some(key);
        }
        if let Some(secret) = lookup("WOOCOMMERCE_SECRET") {
            self.woocommerce.consumer_secret = Some(secret);
        }
        if let Some(ip) = lookup("PRINTER_IP") {
            self.printer.printer_ip = ip;
        }
        if let Some(port) = lookup("PRINTER_PORT").and_then(|p| p.parse().ok()) {
            self.printer.printer_port = port;
        }
    }
}
