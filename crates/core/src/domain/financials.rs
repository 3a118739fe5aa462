use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One reporting period's figures for a company.
///
/// `None` means the figure is unknown, which is not the same as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub net_income: Option<f64>,
    pub revenue: Option<f64>,
    pub debt_ratio: Option<f64>,
}

impl FinancialSnapshot {
    /// Builds a snapshot, dropping non-finite values.
    pub fn new(net_income: Option<f64>, revenue: Option<f64>, debt_ratio: Option<f64>) -> Self {
        Self {
            net_income: net_income.filter(|v| v.is_finite()),
            revenue: revenue.filter(|v| v.is_finite()),
            debt_ratio: debt_ratio.filter(|v| v.is_finite()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads `net_income`, `revenue` and `debt_ratio` out of a loosely typed JSON object.
    ///
    /// Numbers and numeric strings are accepted; anything else becomes absent.
    pub fn from_json(v: &Value) -> Self {
        Self::new(
            coerce_number(v.get("net_income")),
            coerce_number(v.get("revenue")),
            coerce_number(v.get("debt_ratio")),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.net_income.is_none() && self.revenue.is_none() && self.debt_ratio.is_none()
    }
}

fn coerce_number(v: Option<&Value>) -> Option<f64> {
    let n = match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

/// A stored snapshot with the period it reports on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub company_id: Uuid,
    pub period: Option<NaiveDate>,
    #[serde(flatten)]
    pub snapshot: FinancialSnapshot,
}
