//! Alert selection and email composition.
//!
//! Both bodies are askama templates under `templates/`; the HTML one is
//! escaped automatically.

use askama::Template;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use stockflow_inventory::{InventoryItem, StockStatus};

pub const ORGANIZATION: &str = "Hello Fermetures";

/// Keep only items that need attention, in alert order: status label
/// descending (out of stock first), then supplier, then material.
pub fn attention_order(items: impl IntoIterator<Item = InventoryItem>) -> Vec<InventoryItem> {
    let mut items: Vec<InventoryItem> = items
        .into_iter()
        .filter(|i| i.status().needs_attention())
        .collect();
    items.sort_by(|a, b| {
        b.status()
            .label()
            .cmp(a.status().label())
            .then_with(|| a.supplier.cmp(&b.supplier))
            .then_with(|| a.material.cmp(&b.material))
    });
    items
}

#[derive(Debug, Error)]
#[error("failed to render stock report: {0}")]
pub struct RenderError(#[from] askama::Error);

/// A composed alert, ready for a mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// The items of one alert, split by severity.
#[derive(Debug, Clone)]
pub struct StockReport<'a> {
    out_of_stock: Vec<&'a InventoryItem>,
    low_stock: Vec<&'a InventoryItem>,
    generated_at: DateTime<FixedOffset>,
}

impl<'a> StockReport<'a> {
    pub fn new(items: &'a [InventoryItem], generated_at: DateTime<FixedOffset>) -> Self {
        let (out_of_stock, low_stock): (Vec<_>, Vec<_>) = items
            .iter()
            .filter(|i| i.status().needs_attention())
            .partition(|i| i.status() == StockStatus::OutOfStock);
        Self {
            out_of_stock,
            low_stock,
            generated_at,
        }
    }

    pub fn total(&self) -> usize {
        self.out_of_stock.len() + self.low_stock.len()
    }

    pub fn action_required(&self) -> bool {
        !self.out_of_stock.is_empty()
    }

    fn date(&self) -> String {
        self.generated_at.format("%d/%m/%Y").to_string()
    }

    fn time(&self) -> String {
        self.generated_at.format("%H:%M").to_string()
    }

    pub fn subject(&self) -> String {
        let mut subject = format!(
            "Rapport stock {ORGANIZATION} - {} {}",
            self.date(),
            self.generated_at.format("%Hh%M")
        );
        if self.action_required() {
            subject.push_str(" - Action requise");
        }
        subject
    }

    pub fn text(&self) -> Result<String, RenderError> {
        let body = TextBody {
            organization: ORGANIZATION,
            report: self,
        };
        Ok(body.render()?)
    }

    pub fn html(&self) -> Result<String, RenderError> {
        let body = HtmlBody {
            organization: ORGANIZATION,
            report: self,
        };
        Ok(body.render()?)
    }

    pub fn compose(&self) -> Result<AlertEmail, RenderError> {
        Ok(AlertEmail {
            subject: self.subject(),
            text: self.text()?,
            html: self.html()?,
        })
    }
}

#[derive(Template)]
#[template(path = "stock_alert.txt")]
struct TextBody<'r, 'a> {
    organization: &'static str,
    report: &'r StockReport<'a>,
}

#[derive(Template)]
#[template(path = "stock_alert.html")]
struct HtmlBody<'r, 'a> {
    organization: &'static str,
    report: &'r StockReport<'a>,
}
