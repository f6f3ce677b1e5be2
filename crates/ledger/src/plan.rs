//! Pure planning of stock writes.
//!
//! A planner reads a product snapshot, decides, and returns the movement
//! together with the updated product. Nothing is persisted here; the
//! services commit the plan through the store's combined-write primitive.

use std::collections::HashMap;

use tallerpos_catalog::Product;
use tallerpos_core::{LedgerError, LedgerResult, LineFailure, MovementId, ProductId};

use crate::line::LineItem;
use crate::movement::{Movement, MovementContext, MovementKind};

/// Plan a single movement against one product snapshot.
///
/// Fails with `InvalidQuantity` (quantity <= 0) or `InsufficientStock` (the
/// signed delta would drive stock below zero). On success the returned
/// product carries the new stock and the snapshot's version, so the store
/// can run its optimistic check against the state this plan was made from.
pub fn plan_movement(
    product: &Product,
    kind: MovementKind,
    quantity: i64,
    ctx: &MovementContext,
) -> LedgerResult<(Movement, Product)> {
    if quantity <= 0 {
        return Err(LedgerError::InvalidQuantity(quantity));
    }

    let stock_before = product.stock;
    let stock_after = stock_before + kind.sign() * quantity;
    if stock_after < 0 {
        return Err(LedgerError::InsufficientStock {
            requested: quantity,
            available: stock_before.max(0),
        });
    }

    let movement = Movement {
        id: ctx.movement_id.unwrap_or_else(MovementId::new),
        product_id: product.id,
        kind,
        quantity,
        stock_before,
        stock_after,
        reference: ctx.reference.clone(),
        reference_id: ctx.reference_id,
        reason: ctx.reason.clone(),
        notes: ctx.notes.clone(),
        actor: ctx.actor.clone(),
        occurred_at: ctx.occurred_at,
    };

    let mut updated = product.clone();
    updated.stock = stock_after;
    updated.updated_at = ctx.occurred_at;

    Ok((movement, updated))
}

/// Outcome of planning a whole batch: one movement per inventory line and
/// the final state of every touched product (ordered by id, deterministic).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub movements: Vec<Movement>,
    pub products: Vec<Product>,
}

/// Plan a whole batch against one snapshot set, all-or-nothing.
///
/// Lines are walked in order and the working stock carries across lines, so
/// two lines of the same product are judged jointly. Service lines are
/// skipped. Failures are collected for *every* bad line (not fail-fast) and
/// reported as `BatchRejected`; in that case nothing is to be written.
pub fn plan_batch(
    snapshot: &HashMap<ProductId, Product>,
    items: &[LineItem],
    kind: MovementKind,
    ctx: &MovementContext,
) -> LedgerResult<BatchPlan> {
    let mut working: HashMap<ProductId, Product> = HashMap::new();
    let mut movements = Vec::new();
    let mut failures = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        let LineItem::Inventory {
            product_id,
            quantity,
            movement_id,
        } = item
        else {
            continue;
        };

        let current = working
            .get(product_id)
            .or_else(|| snapshot.get(product_id));
        let Some(current) = current else {
            failures.push(LineFailure {
                line: idx,
                error: Box::new(LedgerError::NotFound(*product_id)),
            });
            continue;
        };

        let line_ctx = MovementContext {
            movement_id: *movement_id,
            ..ctx.clone()
        };
        match plan_movement(current, kind, *quantity, &line_ctx) {
            Ok((movement, updated)) => {
                movements.push(movement);
                working.insert(*product_id, updated);
            }
            Err(error) => failures.push(LineFailure {
                line: idx,
                error: Box::new(error),
            }),
        }
    }

    if !failures.is_empty() {
        return Err(LedgerError::BatchRejected(failures));
    }

    let mut products: Vec<Product> = working.into_values().collect();
    products.sort_by_key(|p| p.id);

    Ok(BatchPlan { movements, products })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use tallerpos_catalog::Product;

    fn test_time() -> DateTime<Utc> {
        "2026-02-01T09:30:00Z".parse().unwrap()
    }

    fn test_ctx() -> MovementContext {
        MovementContext::new("tester", test_time())
    }

    fn test_product(stock: i64, minimum: i64) -> Product {
        let mut p = Product::new(
            ProductId::new(),
            "OIL-5W30",
            "Engine oil 5W30",
            1000,
            1500,
            minimum,
            test_time(),
        )
        .unwrap();
        p.stock = stock;
        p
    }

    #[test]
    fn outbound_movement_decrements_stock() {
        let product = test_product(5, 2);
        let (movement, updated) =
            plan_movement(&product, MovementKind::Outbound, 3, &test_ctx()).unwrap();

        assert_eq!(movement.stock_before, 5);
        assert_eq!(movement.stock_after, 2);
        assert!(movement.is_consistent());
        assert_eq!(updated.stock, 2);
        assert_eq!(updated.version, product.version);
    }

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        let product = test_product(5, 2);
        for qty in [0, -1] {
            let err = plan_movement(&product, MovementKind::Inbound, qty, &test_ctx()).unwrap_err();
            assert_eq!(err, LedgerError::InvalidQuantity(qty));
        }
    }

    #[test]
    fn overdraw_fails_and_reports_availability() {
        let product = test_product(0, 2);
        let err = plan_movement(&product, MovementKind::Outbound, 1, &test_ctx()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                requested: 1,
                available: 0
            }
        );
    }

    #[test]
    fn adjustment_in_can_lift_corrupted_negative_stock_to_zero() {
        // Out-of-band corruption: materialized stock at -3. The compensating
        // adjustment clamps it back to zero.
        let mut product = test_product(0, 2);
        product.stock = -3;
        let (movement, updated) =
            plan_movement(&product, MovementKind::AdjustmentIn, 3, &test_ctx()).unwrap();
        assert_eq!(movement.stock_before, -3);
        assert_eq!(movement.stock_after, 0);
        assert_eq!(updated.stock, 0);
    }

    #[test]
    fn caller_supplied_movement_id_is_honored() {
        let product = test_product(5, 2);
        let id = MovementId::new();
        let ctx = test_ctx().with_movement_id(id);
        let (movement, _) = plan_movement(&product, MovementKind::Outbound, 1, &ctx).unwrap();
        assert_eq!(movement.id, id);
    }

    #[test]
    fn batch_lines_on_the_same_product_share_one_running_stock() {
        let product = test_product(5, 2);
        let snapshot = HashMap::from([(product.id, product.clone())]);
        let items = vec![
            LineItem::inventory(product.id, 3),
            LineItem::inventory(product.id, 2),
        ];

        let plan = plan_batch(&snapshot, &items, MovementKind::Outbound, &test_ctx()).unwrap();
        assert_eq!(plan.movements.len(), 2);
        assert_eq!(plan.movements[0].stock_after, 2);
        assert_eq!(plan.movements[1].stock_before, 2);
        assert_eq!(plan.products.len(), 1);
        assert_eq!(plan.products[0].stock, 0);
    }

    #[test]
    fn one_bad_line_rejects_the_whole_plan() {
        let a = test_product(5, 2);
        let b = test_product(1, 1);
        let snapshot = HashMap::from([(a.id, a.clone()), (b.id, b.clone())]);
        let items = vec![
            LineItem::inventory(a.id, 2),
            LineItem::inventory(b.id, 4), // insufficient
            LineItem::inventory(a.id, 1),
        ];

        let err = plan_batch(&snapshot, &items, MovementKind::Outbound, &test_ctx()).unwrap_err();
        let LedgerError::BatchRejected(failures) = err else {
            panic!("expected BatchRejected");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].line, 1);
        assert!(matches!(
            *failures[0].error,
            LedgerError::InsufficientStock { requested: 4, available: 1 }
        ));
    }

    #[test]
    fn service_lines_are_skipped_but_keep_line_numbering() {
        let a = test_product(5, 2);
        let missing = ProductId::new();
        let snapshot = HashMap::from([(a.id, a.clone())]);
        let items = vec![
            LineItem::service("Labor: brake change", 2500),
            LineItem::inventory(a.id, 2),
            LineItem::inventory(missing, 1),
        ];

        let err = plan_batch(&snapshot, &items, MovementKind::Outbound, &test_ctx()).unwrap_err();
        let LedgerError::BatchRejected(failures) = err else {
            panic!("expected BatchRejected");
        };
        assert_eq!(failures.len(), 1);
        // Index 2, counting the service line.
        assert_eq!(failures[0].line, 2);
        assert!(matches!(*failures[0].error, LedgerError::NotFound(id) if id == missing));
    }

    #[test]
    fn empty_batch_plans_nothing() {
        let snapshot = HashMap::new();
        let plan = plan_batch(&snapshot, &[], MovementKind::Outbound, &test_ctx()).unwrap();
        assert!(plan.movements.is_empty());
        assert!(plan.products.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use crate::movement::net_of;

        fn arb_step() -> impl Strategy<Value = (MovementKind, i64)> {
            (
                prop_oneof![
                    Just(MovementKind::Inbound),
                    Just(MovementKind::Outbound),
                    Just(MovementKind::AdjustmentIn),
                    Just(MovementKind::AdjustmentOut),
                ],
                1i64..50,
            )
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: after any sequence of planned movements, stock is
            /// never negative and equals the net signed sum of the accepted
            /// movements (the ledger-is-truth invariant).
            #[test]
            fn stock_always_equals_ledger_net(steps in prop::collection::vec(arb_step(), 1..40)) {
                let mut product = test_product(0, 2);
                let mut accepted: Vec<Movement> = Vec::new();

                for (kind, qty) in steps {
                    match plan_movement(&product, kind, qty, &test_ctx()) {
                        Ok((movement, updated)) => {
                            prop_assert!(updated.stock >= 0);
                            prop_assert!(movement.is_consistent());
                            accepted.push(movement);
                            product = updated;
                        }
                        Err(LedgerError::InsufficientStock { .. }) => {
                            // Rejected plans must leave no trace.
                        }
                        Err(e) => return Err(TestCaseError::fail(format!("unexpected error: {e}"))),
                    }
                    prop_assert_eq!(product.stock, net_of(&accepted));
                }
            }

            /// Property: planning is deterministic: the same snapshot and
            /// context always produce the same movement and product.
            #[test]
            fn planning_is_deterministic(qty in 1i64..100) {
                let product = test_product(500, 2);
                let ctx = test_ctx().with_movement_id(MovementId::new());
                let first = plan_movement(&product, MovementKind::Outbound, qty, &ctx).unwrap();
                let second = plan_movement(&product, MovementKind::Outbound, qty, &ctx).unwrap();
                prop_assert_eq!(first, second);
            }
        }
    }
}
