use crate::db::{Row, TargetStore};
use crate::error::MigrationResult;
use crate::mapping::EntityType;
use crate::report::Verification;
use serde_json::Value;

const SAMPLE_SIZE: usize = 5;

/// Count the relationship tables and spot-check a few resolved links.
pub fn verify(store: &dyn TargetStore) -> MigrationResult<Verification> {
    let mut verification = Verification {
        invoice_work_order_items: store.count(EntityType::InvoiceWorkOrderLinks.table())?,
        work_order_additional_items: store.count(EntityType::WorkOrderAdditionalItems.table())?,
        ..Default::default()
    };

    for entity in [
        EntityType::Companies,
        EntityType::Products,
        EntityType::Invoices,
        EntityType::WorkOrders,
    ] {
        verification
            .entity_counts
            .insert(entity.table().to_string(), store.count(entity.table())?);
    }

    let links = store.select(
        EntityType::InvoiceWorkOrderLinks.table(),
        &["invoice_id", "work_order_id"],
        &[],
        Some(SAMPLE_SIZE),
    )?;
    for link in &links {
        let invoice = lookup(store, EntityType::Invoices, link.get("invoice_id"), "invoice_number")?;
        let order = lookup(store, EntityType::WorkOrders, link.get("work_order_id"), "order_number")?;
        verification.samples.push(format!(
            "{} -> {}",
            invoice.as_deref().unwrap_or("?"),
            order.as_deref().unwrap_or("?")
        ));
    }

    Ok(verification)
}

fn lookup(
    store: &dyn TargetStore,
    entity: EntityType,
    id: Option<&Value>,
    column: &str,
) -> MigrationResult<Option<String>> {
    let Some(id) = id.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let rows: Vec<Row> = store.select(entity.table(), &[column], &[("id", id.clone())], Some(1))?;
    Ok(rows
        .first()
        .and_then(|row| row.get(column))
        .and_then(Value::as_str)
        .map(str::to_string))
}
