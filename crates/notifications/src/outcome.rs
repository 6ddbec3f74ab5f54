use serde::Serialize;

/// What a stock check ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Every item is available.
    NothingToReport,
    /// Items need attention but an alert went out inside the window.
    Suppressed,
    /// An alert was sent and logged.
    Sent,
}

/// Result returned by every entry point of the stock check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub success: bool,
    pub items_count: usize,
    pub outcome: CheckOutcome,
    pub message: String,
}

impl CheckResult {
    pub fn new(items_count: usize, outcome: CheckOutcome) -> Self {
        let message = if items_count == 0 {
            "Tous les stocks sont normaux".to_string()
        } else {
            format!("Trouvé {items_count} article(s) nécessitant attention")
        };
        Self {
            success: true,
            items_count,
            outcome,
            message,
        }
    }
}
