use super::MappedEntity;
use crate::error::MigrationError;

/// Reject mapped records the target store could never accept.
///
/// Runs after mapping and before foreign-key resolution; an `Err` here is a
/// soft, per-record failure.
pub fn validate(entity: &MappedEntity) -> Result<(), MigrationError> {
    let kind = entity.entity_type();
    let missing = |what: &str| Err(MigrationError::skipped(kind, format!("missing {what}")));

    match entity {
        MappedEntity::Company(c) if c.tax_number.is_none() => missing("tax_number"),
        MappedEntity::Product(p) if p.code.is_none() => missing("code"),
        MappedEntity::Invoice(i) if i.invoice_number.is_none() => missing("invoice number or year"),
        MappedEntity::WorkOrder(w) if w.order_number.is_none() => missing("work order id"),
        MappedEntity::InvoiceWorkOrderLink(l) if l.invoice_ref.is_none() => {
            missing("invoice id or year")
        }
        MappedEntity::InvoiceWorkOrderLink(l) if l.work_order_ref.is_none() => {
            missing("work order id")
        }
        MappedEntity::WorkOrderAdditionalItem(i) if i.work_order_ref.is_none() => {
            missing("work order id")
        }
        MappedEntity::WorkOrderAdditionalItem(i) if i.description.is_none() => {
            missing("description")
        }
        MappedEntity::WorkOrderAdditionalItem(i) if i.item_key.is_none() => missing("item number"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{EntityType, map};
    use crate::record::LegacyRecord;

    #[test]
    fn test_company_without_tax_number() {
        let entity = map(&LegacyRecord::new().with("NAZIV", "Bez PIB-a"), EntityType::Companies);
        let err = validate(&entity).unwrap_err();
        assert!(matches!(err, MigrationError::RecordMappingSkipped { .. }));
        assert!(err.to_string().contains("tax_number"));
    }

    #[test]
    fn test_valid_product() {
        let entity = map(&LegacyRecord::new().with("SF_ARTIKLA", 1i64), EntityType::Products);
        assert!(validate(&entity).is_ok());
    }
}
