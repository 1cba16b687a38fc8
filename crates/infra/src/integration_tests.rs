//! Integration tests for the stock-consistency pipeline.
//!
//! Service → UnitOfWork → Ledger, against the in-memory backend.
//!
//! Verifies:
//! - Stock changes and their triggering records commit or roll back together
//! - Concurrent sales of the same product never oversell
//! - A sale cancelled twice at once restores stock exactly once
//! - Count reconciliation only touches counted products

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stockroom_core::DomainError;
    use stockroom_events::MovementReason;
    use stockroom_products::{NewProduct, Product};
    use stockroom_sales::SalesChannel;

    use crate::catalog::ProductCatalog;
    use crate::catalog::tests::new_product;
    use crate::counts::{InventoryCountEngine, NewCountSession};
    use crate::ingestion::{IngestionOutcome, OrderIngestionAdapter, WebhookVerifier};
    use crate::ledger::InMemoryLedger;
    use crate::sales::SaleRecordManager;

    const SECRET: &str = "integration-secret";

    struct Harness {
        catalog: ProductCatalog<Arc<InMemoryLedger>>,
        sales: SaleRecordManager<Arc<InMemoryLedger>>,
        counts: InventoryCountEngine<Arc<InMemoryLedger>>,
        orders: OrderIngestionAdapter<Arc<InMemoryLedger>>,
    }

    fn setup() -> Harness {
        let ledger = Arc::new(InMemoryLedger::new());
        Harness {
            catalog: ProductCatalog::new(ledger.clone()),
            sales: SaleRecordManager::new(ledger.clone()),
            counts: InventoryCountEngine::new(ledger.clone()),
            orders: OrderIngestionAdapter::new(
                SaleRecordManager::new(ledger),
                WebhookVerifier::new(SECRET),
            ),
        }
    }

    fn mapped(name: &str, external_id: &str, stock: i64) -> NewProduct {
        let mut new = new_product(name, None, stock);
        new.details.external_id = Some(external_id.to_string());
        new
    }

    async fn stock_of(h: &Harness, product: &Product) -> i64 {
        h.catalog.get(product.id_typed()).await.unwrap().stock()
    }

    fn signed(body: &serde_json::Value) -> (Vec<u8>, String) {
        let raw = serde_json::to_vec(body).unwrap();
        let signature = WebhookVerifier::new(SECRET).sign(&raw).unwrap();
        (raw, signature)
    }

    #[tokio::test]
    async fn sell_oversell_then_cancel() {
        let h = setup();
        let p = h.catalog.register(new_product("P", None, 10)).await.unwrap();

        let first = h
            .sales
            .create_sale(p.id_typed(), SalesChannel::InStore, 3)
            .await
            .unwrap();
        assert_eq!(stock_of(&h, &p).await, 7);
        assert!(!first.sale.is_cancelled());

        let err = h
            .sales
            .create_sale(p.id_typed(), SalesChannel::InStore, 10)
            .await
            .unwrap_err();
        match err.domain() {
            Some(DomainError::InsufficientStock { available, .. }) => assert_eq!(*available, 7),
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(stock_of(&h, &p).await, 7);

        let cancelled = h
            .sales
            .cancel_sale(first.sale.id_typed(), "customer return")
            .await
            .unwrap();
        assert_eq!(cancelled.stock, 10);
        assert_eq!(stock_of(&h, &p).await, 10);

        let movements = h.catalog.movements(p.id_typed()).await.unwrap();
        let reasons: Vec<_> = movements.iter().map(|m| m.reason.label()).collect();
        assert_eq!(reasons, vec!["sale", "sale_cancelled"]);
        assert_eq!(movements.iter().map(|m| m.delta()).sum::<i64>(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sales_never_oversell() {
        let h = setup();
        let p = h.catalog.register(new_product("Hot item", None, 5)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..12 {
            let sales = h.sales.clone();
            let product_id = p.id_typed();
            handles.push(tokio::spawn(async move {
                sales.create_sale(product_id, SalesChannel::InStore, 1).await
            }));
        }

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => {
                    assert!(matches!(err.domain(), Some(DomainError::InsufficientStock { .. })));
                    rejected += 1;
                }
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(rejected, 7);
        assert_eq!(stock_of(&h, &p).await, 0);
        assert_eq!(h.sales.list_sales().await.unwrap().len(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cancels_restore_stock_once() {
        let h = setup();
        let p = h.catalog.register(new_product("P", None, 10)).await.unwrap();
        let recorded = h
            .sales
            .create_sale(p.id_typed(), SalesChannel::InStore, 4)
            .await
            .unwrap();
        let sale_id = recorded.sale.id_typed();

        let handles: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|reason| {
                let sales = h.sales.clone();
                tokio::spawn(async move { sales.cancel_sale(sale_id, reason).await })
            })
            .collect();

        let mut cancelled = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(done) => {
                    assert_eq!(done.stock, 10);
                    cancelled += 1;
                }
                Err(err) => {
                    assert_eq!(err.domain(), Some(&DomainError::AlreadyCancelled(sale_id)));
                    rejected += 1;
                }
            }
        }

        assert_eq!((cancelled, rejected), (1, 1));
        assert_eq!(stock_of(&h, &p).await, 10);
        let movements = h.catalog.movements(p.id_typed()).await.unwrap();
        let reasons: Vec<_> = movements.iter().map(|m| m.reason.label()).collect();
        assert_eq!(reasons, vec!["sale", "sale_cancelled"]);
    }

    #[tokio::test]
    async fn duplicated_external_id_resolves_to_first_registered() {
        let h = setup();
        let first = h.catalog.register(mapped("First", "300", 5)).await.unwrap();
        let second = h.catalog.register(mapped("Second", "300", 5)).await.unwrap();

        let (raw, signature) = signed(&serde_json::json!({
            "id": 5010,
            "status": "processing",
            "line_items": [{ "product_id": 300, "quantity": 2 }]
        }));
        h.orders.ingest(&raw, Some(&signature)).await.unwrap();

        assert_eq!(stock_of(&h, &first).await, 3);
        assert_eq!(stock_of(&h, &second).await, 5);
    }

    #[tokio::test]
    async fn order_with_short_line_rolls_back_entirely() {
        let h = setup();
        let a = h.catalog.register(mapped("A", "101", 10)).await.unwrap();
        let b = h.catalog.register(mapped("B", "102", 1)).await.unwrap();

        let (raw, signature) = signed(&serde_json::json!({
            "id": 5001,
            "status": "processing",
            "line_items": [
                { "product_id": 101, "quantity": 4 },
                { "product_id": 102, "quantity": 3 }
            ]
        }));

        let err = h.orders.ingest(&raw, Some(&signature)).await.unwrap_err();
        match err.domain() {
            Some(DomainError::InsufficientStock { product_id, .. }) => {
                assert_eq!(*product_id, b.id_typed())
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(stock_of(&h, &a).await, 10);
        assert_eq!(stock_of(&h, &b).await, 1);
        assert!(h.sales.list_sales().await.unwrap().is_empty());
        assert!(h.catalog.movements(a.id_typed()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn order_skips_unmapped_lines_and_tags_sales() {
        let h = setup();
        let a = h.catalog.register(mapped("A", "101", 10)).await.unwrap();

        let (raw, signature) = signed(&serde_json::json!({
            "id": "5002",
            "status": "processing",
            "line_items": [
                { "product_id": 999, "quantity": 1 },
                { "product_id": "101", "quantity": 2 }
            ]
        }));

        let outcome = h.orders.ingest(&raw, Some(&signature)).await.unwrap();
        let IngestionOutcome::Processed {
            order_id,
            sales,
            skipped,
        } = outcome
        else {
            panic!("Expected Processed outcome");
        };
        assert_eq!(order_id, "5002");
        assert_eq!(skipped, vec!["999".to_string()]);
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].sale.channel(), SalesChannel::External);
        assert_eq!(sales[0].sale.external_order_id(), Some("5002"));
        assert_eq!(stock_of(&h, &a).await, 8);

        let movements = h.catalog.movements(a.id_typed()).await.unwrap();
        assert!(matches!(
            &movements[0].reason,
            MovementReason::ExternalOrder { external_order_id, .. } if external_order_id == "5002"
        ));
    }

    #[tokio::test]
    async fn unsigned_or_unready_orders_change_nothing() {
        let h = setup();
        let a = h.catalog.register(mapped("A", "101", 10)).await.unwrap();
        let body = serde_json::json!({
            "id": 5003,
            "status": "processing",
            "line_items": [{ "product_id": 101, "quantity": 1 }]
        });
        let (raw, _) = signed(&body);

        let err = h.orders.ingest(&raw, Some("Zm9vYmFy")).await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::InvalidSignature));
        let err = h.orders.ingest(&raw, None).await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::InvalidSignature));

        let (raw, signature) = signed(&serde_json::json!({
            "id": 5003,
            "status": "pending",
            "line_items": [{ "product_id": 101, "quantity": 1 }]
        }));
        let outcome = h.orders.ingest(&raw, Some(&signature)).await.unwrap();
        assert_eq!(
            outcome,
            IngestionOutcome::Ignored {
                order_id: "5003".to_string(),
                status: "pending".to_string(),
            }
        );

        let raw = b"{not json".to_vec();
        let signature = WebhookVerifier::new(SECRET).sign(&raw).unwrap();
        let err = h.orders.ingest(&raw, Some(&signature)).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Validation(_))));

        assert_eq!(stock_of(&h, &a).await, 10);
    }

    #[tokio::test]
    async fn count_reconciles_only_counted_products() {
        let h = setup();
        let a = h.catalog.register(new_product("A", None, 5)).await.unwrap();
        let b = h.catalog.register(new_product("B", None, 8)).await.unwrap();

        let session = h
            .counts
            .create_session(NewCountSession {
                name: "Year end".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let system: Vec<_> = session.items().iter().map(|i| i.system_quantity).collect();
        let differences: Vec<_> = session.items().iter().map(|i| i.difference).collect();
        assert_eq!(system, vec![5, 8]);
        assert_eq!(differences, vec![-5, -8]);

        let session = h
            .counts
            .record_count(session.id_typed(), &a.id_typed().to_string(), 5)
            .await
            .unwrap();
        let item = session.item(a.id_typed()).unwrap();
        assert_eq!(item.difference, 0);
        assert!(item.counted);

        let completed = h
            .counts
            .complete_session(session.id_typed(), true)
            .await
            .unwrap();
        assert!(completed.session.is_completed());
        assert_eq!(completed.reconciled.len(), 1);
        assert_eq!(stock_of(&h, &a).await, 5);
        assert_eq!(stock_of(&h, &b).await, 8);
        assert!(h.catalog.movements(b.id_typed()).await.unwrap().is_empty());

        let err = h
            .counts
            .record_count(session.id_typed(), &a.id_typed().to_string(), 1)
            .await
            .unwrap_err();
        assert_eq!(
            err.domain(),
            Some(&DomainError::SessionCompleted(session.id_typed()))
        );
    }

    #[tokio::test]
    async fn reconciliation_uses_last_count_even_after_sales() {
        let h = setup();
        let a = h.catalog.register(new_product("A", None, 9)).await.unwrap();
        let session = h
            .counts
            .create_session(NewCountSession {
                name: "Spot check".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let id = session.id_typed();

        h.counts.record_count(id, &a.id_typed().to_string(), 3).await.unwrap();
        h.counts.record_count(id, &a.id_typed().to_string(), 4).await.unwrap();
        h.sales
            .create_sale(a.id_typed(), SalesChannel::InStore, 2)
            .await
            .unwrap();

        let completed = h.counts.complete_session(id, true).await.unwrap();
        assert_eq!(completed.reconciled[0].previous, 7);
        assert_eq!(completed.reconciled[0].new, 4);
        assert_eq!(stock_of(&h, &a).await, 4);
    }

    #[tokio::test]
    async fn completing_without_apply_leaves_stock_alone() {
        let h = setup();
        let a = h.catalog.register(new_product("A", None, 6)).await.unwrap();
        let session = h
            .counts
            .create_session(NewCountSession {
                name: "Dry run".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        h.counts
            .record_count(session.id_typed(), &a.id_typed().to_string(), 1)
            .await
            .unwrap();

        let completed = h
            .counts
            .complete_session(session.id_typed(), false)
            .await
            .unwrap();
        assert!(completed.reconciled.is_empty());
        assert!(!completed.session.stock_applied());
        assert_eq!(stock_of(&h, &a).await, 6);
    }
}
