use super::bounded;
use crate::domain::cart::CartSnapshot;
use crate::domain::ports::CatalogRef;
use crate::domain::scheduled_order::PriceChangeNote;
use crate::error::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use std::time::Duration;

/// Relative price drift above which a line gets a price-change note.
pub const PRICE_CHANGE_TOLERANCE: Decimal = dec!(0.10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineProblem {
    /// The product is gone from the catalog or switched off.
    Unavailable,
    InsufficientStock { requested: u32, available: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFailure {
    pub product_id: String,
    pub name: String,
    pub problem: LineProblem,
}

impl fmt::Display for LineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            LineProblem::Unavailable => {
                write!(f, "{} ({}): unavailable", self.name, self.product_id)
            }
            LineProblem::InsufficientStock {
                requested,
                available,
            } => write!(
                f,
                "{} ({}): insufficient stock (requested {}, available {})",
                self.name, self.product_id, requested, available
            ),
        }
    }
}

/// Verdict on whether a snapshot can be executed against the live catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub failures: Vec<LineFailure>,
    pub price_changes: Vec<PriceChangeNote>,
}

impl Reconciliation {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// All failing lines, in cart order.
    pub fn failure_reason(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let lines: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
        Some(lines.join("; "))
    }
}

/// Checks a frozen cart against the catalog as it is right now.
///
/// Every line is checked even after the first failure so the reason lists all
/// of them. A lookup that errors (rather than finding nothing) is returned as
/// an error for the caller to retry.
pub struct Reconciler {
    catalog: CatalogRef,
    call_timeout: Duration,
}

impl Reconciler {
    pub fn new(catalog: CatalogRef, call_timeout: Duration) -> Self {
        Self {
            catalog,
            call_timeout,
        }
    }

    pub async fn reconcile(&self, snapshot: &CartSnapshot) -> Result<Reconciliation> {
        let mut result = Reconciliation::default();

        for line in snapshot.items() {
            let record = bounded(
                "catalog lookup",
                self.call_timeout,
                self.catalog.get_product(&line.product_id),
            )
            .await?;

            let problem = match &record {
                None => Some(LineProblem::Unavailable),
                Some(product) if !product.is_available => Some(LineProblem::Unavailable),
                Some(product) if product.stock < line.quantity => {
                    Some(LineProblem::InsufficientStock {
                        requested: line.quantity,
                        available: product.stock,
                    })
                }
                Some(_) => None,
            };

            if let Some(problem) = problem {
                tracing::debug!(product_id = %line.product_id, ?problem, "line failed reconciliation");
                result.failures.push(LineFailure {
                    product_id: line.product_id.clone(),
                    name: line.name.clone(),
                    problem,
                });
                continue;
            }

            if let Some(product) = record
                && line.price.value() > Decimal::ZERO
            {
                let delta = (product.price.value() - line.price.value()).abs() / line.price.value();
                if delta > PRICE_CHANGE_TOLERANCE {
                    tracing::debug!(
                        product_id = %line.product_id,
                        snapshot = %line.price,
                        current = %product.price,
                        "price drifted since scheduling"
                    );
                    result.price_changes.push(PriceChangeNote {
                        product_id: line.product_id.clone(),
                        name: line.name.clone(),
                        snapshot_price: line.price,
                        current_price: product.price,
                    });
                }
            }
        }

        Ok(result)
    }
}
