//! Persisted shape of a costing sheet.
//!
//! Records are flat and storage-friendly: lock state is spread over
//! `is_locked` and the `linked_*` columns, and totals are stored as a cache.
//! Restoring a record never recomputes anything.

use serde::{Deserialize, Serialize};

use printerp_core::{AggregateRoot, DomainError, DomainResult, Entity};
use printerp_products::ProductId;

use crate::component::{ComponentRow, ComponentType};
use crate::formula::FormulaError;
use crate::sheet::{CostingSheet, CostingSheetId};
use crate::totals::{PricingParameters, Totals};
use crate::variant::{
    CostingVariant, DocumentId, DocumentLink, LinkedDocumentKind, VariantId, VariantState,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub component_type: ComponentType,
    pub formula: String,
    pub calculated_cost: f64,
    pub sort_order: u32,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FormulaError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub id: VariantId,
    pub name: String,
    pub finished_product_id: Option<ProductId>,
    pub product_vat_exempt: Option<bool>,
    pub quantity: f64,
    pub profit_margin_percent: f64,
    pub tax_percent: f64,
    #[serde(default)]
    pub tax_percent_explicit: bool,
    pub components: Vec<ComponentRecord>,
    #[serde(flatten)]
    pub totals: Totals,
    pub is_locked: bool,
    pub linked_quotation_id: Option<DocumentId>,
    pub linked_quotation_number: Option<String>,
    pub linked_order_id: Option<DocumentId>,
    pub linked_order_number: Option<String>,
    pub is_included: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostingSheetRecord {
    pub id: CostingSheetId,
    pub name: String,
    pub version: u64,
    pub variants: Vec<VariantRecord>,
}

impl From<&ComponentRow> for ComponentRecord {
    fn from(row: &ComponentRow) -> Self {
        Self {
            component_type: row.component_type(),
            formula: row.formula().to_string(),
            calculated_cost: row.calculated_cost(),
            sort_order: row.sort_order(),
            is_active: row.is_active(),
            error: row.error().cloned(),
        }
    }
}

impl From<&CostingVariant> for VariantRecord {
    fn from(variant: &CostingVariant) -> Self {
        let pricing = variant.pricing();
        let mut record = Self {
            id: *variant.id(),
            name: variant.name().to_string(),
            finished_product_id: variant.finished_product_id(),
            product_vat_exempt: variant.product_vat_exempt(),
            quantity: pricing.quantity,
            profit_margin_percent: pricing.profit_margin_percent,
            tax_percent: pricing.tax_percent,
            tax_percent_explicit: variant.tax_percent_explicit(),
            components: variant.components().iter().map(ComponentRecord::from).collect(),
            totals: *variant.totals(),
            is_locked: variant.is_locked(),
            linked_quotation_id: None,
            linked_quotation_number: None,
            linked_order_id: None,
            linked_order_number: None,
            is_included: variant.is_included(),
        };
        if let Some(link) = variant.link() {
            match link.kind {
                LinkedDocumentKind::Quotation => {
                    record.linked_quotation_id = Some(link.document_id);
                    record.linked_quotation_number = Some(link.document_number.clone());
                }
                LinkedDocumentKind::Order => {
                    record.linked_order_id = Some(link.document_id);
                    record.linked_order_number = Some(link.document_number.clone());
                }
            }
        }
        record
    }
}

impl CostingSheet {
    pub fn to_record(&self) -> CostingSheetRecord {
        CostingSheetRecord {
            id: self.id_typed(),
            name: self.name().to_string(),
            version: self.version(),
            variants: self.variants().iter().map(VariantRecord::from).collect(),
        }
    }

    /// Rebuild a sheet from storage. Referential inconsistencies (a lock
    /// without a link, a link without a lock, duplicated rows or variants)
    /// reject the whole record.
    pub fn from_record(record: &CostingSheetRecord) -> DomainResult<Self> {
        if record.variants.is_empty() {
            return Err(inconsistent(record.id, "record has no variants"));
        }

        let mut variants: Vec<CostingVariant> = Vec::with_capacity(record.variants.len());
        for variant in &record.variants {
            if variants.iter().any(|v| v.id() == &variant.id) {
                return Err(inconsistent(
                    record.id,
                    format!("variant {} appears twice", variant.id),
                ));
            }
            variants.push(restore_variant(record.id, variant)?);
        }

        Ok(CostingSheet::restore(
            record.id,
            record.name.clone(),
            variants,
            record.version,
        ))
    }
}

fn restore_variant(sheet_id: CostingSheetId, record: &VariantRecord) -> DomainResult<CostingVariant> {
    let state = restore_state(sheet_id, record)?;
    let components = restore_components(sheet_id, record)?;
    Ok(CostingVariant::restore(
        record.id,
        record.name.clone(),
        record.finished_product_id,
        record.product_vat_exempt,
        components,
        PricingParameters {
            quantity: record.quantity,
            profit_margin_percent: record.profit_margin_percent,
            tax_percent: record.tax_percent,
        },
        record.tax_percent_explicit,
        record.totals,
        state,
        record.is_included,
    ))
}

fn restore_state(sheet_id: CostingSheetId, record: &VariantRecord) -> DomainResult<VariantState> {
    let quotation = match (record.linked_quotation_id, &record.linked_quotation_number) {
        (Some(id), Some(number)) => Some(DocumentLink::quotation(id, number.clone())),
        _ => None,
    };
    let order = match (record.linked_order_id, &record.linked_order_number) {
        (Some(id), Some(number)) => Some(DocumentLink::order(id, number.clone())),
        _ => None,
    };

    match (record.is_locked, quotation.or(order)) {
        // A quotation link takes precedence over an order link.
        (true, Some(link)) => Ok(VariantState::Locked(link)),
        (false, None) => Ok(VariantState::Editable),
        (true, None) => Err(inconsistent(
            sheet_id,
            format!("variant {} is locked but has no linked document", record.id),
        )),
        (false, Some(link)) => Err(inconsistent(
            sheet_id,
            format!(
                "variant {} is linked to {} {} but not locked",
                record.id, link.kind, link.document_number
            ),
        )),
    }
}

/// Rows come back in type order. Types missing from an older record get
/// fresh empty rows; duplicated types are rejected.
fn restore_components(
    sheet_id: CostingSheetId,
    record: &VariantRecord,
) -> DomainResult<Vec<ComponentRow>> {
    let mut rows = Vec::with_capacity(ComponentType::ALL.len());
    for component_type in ComponentType::ALL {
        let mut matching = record
            .components
            .iter()
            .filter(|c| c.component_type == component_type);
        let row = match (matching.next(), matching.next()) {
            (Some(c), None) => ComponentRow::restore(
                c.component_type,
                c.formula.clone(),
                c.calculated_cost,
                c.is_active,
                c.error.clone(),
            ),
            (None, _) => ComponentRow::new(component_type),
            (Some(_), Some(_)) => {
                return Err(inconsistent(
                    sheet_id,
                    format!("variant {} has two {component_type} rows", record.id),
                ));
            }
        };
        rows.push(row);
    }
    Ok(rows)
}

fn inconsistent(sheet_id: CostingSheetId, detail: impl Into<String>) -> DomainError {
    let detail = detail.into();
    tracing::error!(sheet_id = %sheet_id, detail = %detail, "referential inconsistency in costing record");
    DomainError::invariant(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use printerp_core::{Aggregate, AggregateId};

    use crate::sheet::{CostingCommand, SheetEdit};

    fn locked_sheet() -> (CostingSheet, VariantId) {
        let variant_id = VariantId::new(AggregateId::new());
        let mut sheet = CostingSheet::new(
            CostingSheetId::new(AggregateId::new()),
            "Calendars",
            variant_id,
        );
        for edit in [
            SheetEdit::CommitFormula {
                variant_id,
                component: ComponentType::Paper,
                formula: "32*120".to_string(),
            },
            SheetEdit::CommitFormula {
                variant_id,
                component: ComponentType::Ink,
                formula: "(7".to_string(),
            },
            SheetEdit::SetQuantity {
                variant_id,
                quantity: 3000.0,
            },
            SheetEdit::LinkVariant {
                variant_id,
                link: DocumentLink::quotation(DocumentId::new(AggregateId::new()), "QT-0042"),
            },
        ] {
            sheet
                .execute(&CostingCommand::new(sheet.id_typed(), edit))
                .unwrap();
        }
        (sheet, variant_id)
    }

    #[test]
    fn record_round_trip_preserves_state() {
        let (sheet, _) = locked_sheet();
        let record = sheet.to_record();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: CostingSheetRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(CostingSheet::from_record(&parsed).unwrap(), sheet);
    }

    #[test]
    fn lock_is_flattened() {
        let (sheet, _) = locked_sheet();
        let record = sheet.to_record();
        let variant = &record.variants[0];
        assert!(variant.is_locked);
        assert_eq!(variant.linked_quotation_number.as_deref(), Some("QT-0042"));
        assert!(variant.linked_order_id.is_none());
        assert_eq!(variant.components.len(), 15);
        assert_eq!(variant.components[4].sort_order, 4);
    }

    #[test]
    fn restore_keeps_persisted_totals() {
        let (sheet, _) = locked_sheet();
        let mut record = sheet.to_record();
        record.variants[0].totals.total = 1.0;
        let restored = CostingSheet::from_record(&record).unwrap();
        assert_eq!(restored.variants()[0].totals().total, 1.0);
    }

    #[test]
    fn locked_without_link_is_rejected() {
        let (sheet, _) = locked_sheet();
        let mut record = sheet.to_record();
        record.variants[0].linked_quotation_id = None;
        let err = CostingSheet::from_record(&record).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("no linked document") => {}
            _ => panic!("Expected InvariantViolation, got: {err:?}"),
        }
    }

    #[test]
    fn link_without_lock_is_rejected() {
        let (sheet, _) = locked_sheet();
        let mut record = sheet.to_record();
        record.variants[0].is_locked = false;
        assert!(matches!(
            CostingSheet::from_record(&record),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn missing_rows_are_filled_and_duplicates_rejected() {
        let (sheet, _) = locked_sheet();

        let mut record = sheet.to_record();
        record.variants[0]
            .components
            .retain(|c| c.component_type != ComponentType::Overheads);
        let restored = CostingSheet::from_record(&record).unwrap();
        assert_eq!(restored.variants()[0].components().len(), 15);

        let mut record = sheet.to_record();
        let dup = record.variants[0].components[0].clone();
        record.variants[0].components.push(dup);
        assert!(CostingSheet::from_record(&record).is_err());
    }

    #[test]
    fn empty_record_is_rejected() {
        let (sheet, _) = locked_sheet();
        let mut record = sheet.to_record();
        record.variants.clear();
        assert!(CostingSheet::from_record(&record).is_err());
    }
}
