//! Read-side assembly of [`SaleDetails`].

use std::collections::HashMap;

use crate::error::LedgerResult;
use stockbill_core::{LineDetails, LineItem, Product, Sale, SaleDetails};
use stockbill_db::Database;

/// Resolves a sale's client and each line's current product for display.
///
/// Lines whose product has since been deleted get `product: None`.
pub(crate) async fn load_details(
    db: &Database,
    sale: Sale,
    items: Vec<LineItem>,
) -> LedgerResult<SaleDetails> {
    let client = db.clients().get_by_id(&sale.client_id).await?;

    let products = db.products();
    let mut resolved: HashMap<String, Option<Product>> = HashMap::new();
    for item in &items {
        if !resolved.contains_key(&item.product_id) {
            let product = products.get_by_id(&item.product_id).await?;
            resolved.insert(item.product_id.clone(), product);
        }
    }

    let items = items
        .into_iter()
        .map(|item| {
            let product = resolved.get(&item.product_id).cloned().flatten();
            LineDetails { item, product }
        })
        .collect();

    Ok(SaleDetails {
        sale,
        client,
        items,
    })
}
