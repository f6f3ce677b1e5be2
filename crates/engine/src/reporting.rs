//! Read-side aggregations over the product list and sales history.
//!
//! Everything here works off one snapshot or one query; nothing mutates.
//! Monetary values are raw sums over the materialized rows, so a corrupted
//! stock shows up in valuation too. Run the auditor first if that matters.

use serde::{Deserialize, Serialize};

use tallerpos_core::{LedgerResult, ProductId};
use tallerpos_sales::Period;
use tallerpos_store::LedgerStore;

/// Inventory valuation over active products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub total_units: i64,
    pub total_cost_value: i64,
    pub total_retail_value: i64,
    pub potential_margin: i64,
}

/// Stock level relative to the configured minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockHealth {
    Ok,
    Low,
    Critical,
    OutOfStock,
}

/// Classifies a stock level. A minimum of zero means the product opted out
/// of low-stock tracking and can only be `Ok` or `OutOfStock`.
pub fn classify(stock: i64, minimum: i64) -> StockHealth {
    if stock <= 0 {
        StockHealth::OutOfStock
    } else if minimum > 0 && stock <= minimum {
        StockHealth::Critical
    } else if minimum > 0 && stock <= 2 * minimum {
        StockHealth::Low
    } else {
        StockHealth::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductHealth {
    pub product_id: ProductId,
    pub stock: i64,
    pub stock_minimum: i64,
    pub health: StockHealth,
}

/// Sales aggregates for one product over a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesStats {
    pub units_sold: i64,
    pub revenue: i64,
    pub cost: i64,
    pub gross_margin: i64,
    /// Revenue divided by units, truncated to whole cents. Zero when
    /// nothing sold.
    pub average_sell_price: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSeller {
    pub product_id: ProductId,
    pub units_sold: i64,
    pub revenue: i64,
}

/// Read-only reporting facade over a ledger store.
#[derive(Debug)]
pub struct ReportingEngine<S> {
    store: S,
}

impl<S: LedgerStore> ReportingEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Valuation over active products only; discontinued stock is sunk.
    pub fn valuation(&self) -> LedgerResult<Valuation> {
        let mut valuation = Valuation::default();
        for product in self.store.list()? {
            if !product.is_active() {
                continue;
            }
            valuation.total_units += product.stock;
            valuation.total_cost_value += product.stock * product.purchase_price;
            valuation.total_retail_value += product.stock * product.sale_price;
        }
        valuation.potential_margin = valuation.total_retail_value - valuation.total_cost_value;
        Ok(valuation)
    }

    pub fn stock_health(&self) -> LedgerResult<Vec<ProductHealth>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|p| p.is_active())
            .map(|p| ProductHealth {
                product_id: p.id,
                stock: p.stock,
                stock_minimum: p.stock_minimum,
                health: classify(p.stock, p.stock_minimum),
            })
            .collect())
    }

    /// Active products running low: `Low` or `Critical`, not yet out.
    pub fn list_low_stock(&self) -> LedgerResult<Vec<ProductHealth>> {
        Ok(self
            .stock_health()?
            .into_iter()
            .filter(|h| matches!(h.health, StockHealth::Low | StockHealth::Critical))
            .collect())
    }

    pub fn list_out_of_stock(&self) -> LedgerResult<Vec<ProductHealth>> {
        Ok(self
            .stock_health()?
            .into_iter()
            .filter(|h| h.health == StockHealth::OutOfStock)
            .collect())
    }

    pub fn product_sales_stats(
        &self,
        product_id: ProductId,
        period: &Period,
    ) -> LedgerResult<SalesStats> {
        let mut stats = SalesStats::default();
        for sale in self.store.sales_in(period)? {
            for line in sale.lines.iter().filter(|l| l.product_id == product_id) {
                stats.units_sold += line.quantity;
                stats.revenue += line.revenue();
                stats.cost += line.cost();
            }
        }
        stats.gross_margin = stats.revenue - stats.cost;
        if stats.units_sold > 0 {
            stats.average_sell_price = stats.revenue / stats.units_sold;
        }
        Ok(stats)
    }

    /// Top sellers by units, ties broken by revenue then product id so the
    /// ordering is stable across runs.
    pub fn top_sellers(&self, period: &Period, limit: usize) -> LedgerResult<Vec<TopSeller>> {
        use std::collections::HashMap;

        let mut totals: HashMap<ProductId, (i64, i64)> = HashMap::new();
        for sale in self.store.sales_in(period)? {
            for line in &sale.lines {
                let entry = totals.entry(line.product_id).or_insert((0, 0));
                entry.0 += line.quantity;
                entry.1 += line.revenue();
            }
        }

        let mut sellers: Vec<TopSeller> = totals
            .into_iter()
            .map(|(product_id, (units_sold, revenue))| TopSeller {
                product_id,
                units_sold,
                revenue,
            })
            .collect();
        sellers.sort_by(|a, b| {
            b.units_sold
                .cmp(&a.units_sold)
                .then(b.revenue.cmp(&a.revenue))
                .then(a.product_id.cmp(&b.product_id))
        });
        sellers.truncate(limit);
        Ok(sellers)
    }
}
