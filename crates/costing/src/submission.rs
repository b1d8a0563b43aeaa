//! Submission: sheet-wide validation and the persistence boundary.
//!
//! Validation collects every issue so the user can fix them in one pass.
//! Nothing is written unless validation passes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use printerp_core::{DomainError, ValidationErrors};

use crate::record::CostingSheetRecord;
use crate::sheet::{CostingSheet, CostingSheetId};
use crate::vat::{VatSummary, check_classification, check_rate, check_vat_consistency};

/// Check that a sheet may be persisted.
pub fn validate_for_submit(sheet: &CostingSheet) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if sheet.name().trim().is_empty() {
        errors.push("costing sheet name is required");
    }

    for (index, variant) in sheet.variants().iter().enumerate() {
        if variant.name().trim().is_empty() {
            errors.push(format!("variant {} needs a name", index + 1));
        }
    }

    for variant in sheet.included_variants() {
        if variant.quantity() <= 0.0 {
            errors.push(format!(
                "variant '{}': quantity must be greater than 0",
                variant.name()
            ));
        }
    }

    let summary = check_vat_consistency(sheet.included_variants().map(|v| v.vat_status()));
    if let Err(violation) = check_classification(&summary) {
        errors.push(violation.to_string());
    } else {
        for variant in sheet.included_variants() {
            let own = check_vat_consistency([variant.vat_status()]);
            if let Err(violation) = check_rate(&own, variant.tax_percent()) {
                errors.push(format!("variant '{}': {violation}", variant.name()));
            }
        }
    }

    errors.into_result()
}

/// VAT summary of the variants that would go into a document.
pub fn included_vat_summary(sheet: &CostingSheet) -> VatSummary {
    check_vat_consistency(sheet.included_variants().map(|v| v.vat_status()))
}

/// Persistence failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("stale write for sheet {id}: stored version {stored}, submitted {submitted}")]
    StaleVersion {
        id: CostingSheetId,
        stored: u64,
        submitted: u64,
    },
    #[error("stored record for sheet {id} is inconsistent: {source}")]
    Inconsistent {
        id: CostingSheetId,
        #[source]
        source: DomainError,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Persistence collaborator for costing sheets.
pub trait CostingSheetStore: Send + Sync {
    /// Insert or replace a sheet.
    fn save(&self, record: &CostingSheetRecord) -> Result<CostingSheetId, StoreError>;

    /// Fetch a sheet by id.
    fn load(&self, id: CostingSheetId) -> Result<Option<CostingSheetRecord>, StoreError>;
}

/// In-memory store keeping each sheet as a JSON document.
#[derive(Debug, Default)]
pub struct InMemoryCostingStore {
    documents: RwLock<HashMap<CostingSheetId, String>>,
}

impl InMemoryCostingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.documents.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Raw stored document, as the database would hold it.
    pub fn raw(&self, id: CostingSheetId) -> Result<Option<String>, StoreError> {
        Ok(self.documents.read().map_err(poisoned)?.get(&id).cloned())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("store lock poisoned".to_string())
}

impl CostingSheetStore for InMemoryCostingStore {
    fn save(&self, record: &CostingSheetRecord) -> Result<CostingSheetId, StoreError> {
        let json = serde_json::to_string(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut documents = self.documents.write().map_err(poisoned)?;
        if let Some(existing) = documents.get(&record.id) {
            let stored: CostingSheetRecord = serde_json::from_str(existing)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if stored.version > record.version {
                return Err(StoreError::StaleVersion {
                    id: record.id,
                    stored: stored.version,
                    submitted: record.version,
                });
            }
        }
        documents.insert(record.id, json);
        Ok(record.id)
    }

    fn load(&self, id: CostingSheetId) -> Result<Option<CostingSheetRecord>, StoreError> {
        let documents = self.documents.read().map_err(poisoned)?;
        documents
            .get(&id)
            .map(|json| {
                serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }
}

impl<S: CostingSheetStore + ?Sized> CostingSheetStore for Arc<S> {
    fn save(&self, record: &CostingSheetRecord) -> Result<CostingSheetId, StoreError> {
        (**self).save(record)
    }

    fn load(&self, id: CostingSheetId) -> Result<Option<CostingSheetRecord>, StoreError> {
        (**self).load(id)
    }
}

/// Why a submission did not persist.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmitError {
    #[error("costing sheet rejected: {0}")]
    Rejected(#[from] ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validate, then persist. A rejected sheet is never written.
pub fn submit<S>(sheet: &CostingSheet, store: &S) -> Result<CostingSheetId, SubmitError>
where
    S: CostingSheetStore + ?Sized,
{
    if let Err(errors) = validate_for_submit(sheet) {
        tracing::warn!(
            sheet_id = %sheet.id_typed(),
            issues = errors.len(),
            error = %errors,
            "costing sheet submission rejected"
        );
        return Err(SubmitError::Rejected(errors));
    }

    let id = store.save(&sheet.to_record())?;
    tracing::info!(
        sheet_id = %id,
        variants = sheet.variants().len(),
        "costing sheet saved"
    );
    Ok(id)
}

/// Load and restore a sheet. Inconsistent records are an error, not a
/// partially restored sheet.
pub fn load_sheet<S>(store: &S, id: CostingSheetId) -> Result<Option<CostingSheet>, StoreError>
where
    S: CostingSheetStore + ?Sized,
{
    match store.load(id)? {
        Some(record) => CostingSheet::from_record(&record)
            .map(Some)
            .map_err(|source| StoreError::Inconsistent { id, source }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printerp_core::{Aggregate, AggregateId};
    use printerp_products::{FinishedProduct, ProductId};

    use crate::component::ComponentType;
    use crate::sheet::{CostingCommand, SheetEdit};
    use crate::variant::VariantId;

    fn test_variant_id() -> VariantId {
        VariantId::new(AggregateId::new())
    }

    fn edit(sheet: &mut CostingSheet, edit: SheetEdit) {
        let cmd = CostingCommand::new(sheet.id_typed(), edit);
        sheet.execute(&cmd).unwrap();
    }

    fn product(exempt: Option<bool>) -> FinishedProduct {
        FinishedProduct::new(ProductId::new(AggregateId::new()), "Exercise Book", exempt)
    }

    fn bind(sheet: &mut CostingSheet, variant_id: VariantId, exempt: Option<bool>) {
        edit(
            sheet,
            SheetEdit::BindFinishedProduct {
                variant_id,
                product: product(exempt),
                default_tax_percent: 18.0,
            },
        );
    }

    fn ready_sheet() -> (CostingSheet, VariantId) {
        let variant_id = test_variant_id();
        let mut sheet = CostingSheet::new(
            CostingSheetId::new(AggregateId::new()),
            "Exercise Books",
            variant_id,
        );
        edit(
            &mut sheet,
            SheetEdit::CommitFormula {
                variant_id,
                component: ComponentType::Paper,
                formula: "32*120".to_string(),
            },
        );
        edit(
            &mut sheet,
            SheetEdit::SetQuantity {
                variant_id,
                quantity: 3000.0,
            },
        );
        bind(&mut sheet, variant_id, Some(false));
        (sheet, variant_id)
    }

    #[test]
    fn valid_sheet_passes() {
        let (sheet, _) = ready_sheet();
        assert_eq!(validate_for_submit(&sheet), Ok(()));
    }

    #[test]
    fn every_issue_is_reported() {
        let (mut sheet, variant_id) = ready_sheet();
        edit(&mut sheet, SheetEdit::RenameSheet { name: " ".to_string() });
        edit(
            &mut sheet,
            SheetEdit::RenameVariant {
                variant_id,
                name: String::new(),
            },
        );
        edit(
            &mut sheet,
            SheetEdit::SetQuantity {
                variant_id,
                quantity: 0.0,
            },
        );
        let errors = validate_for_submit(&sheet).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains("costing sheet name is required"));
        assert!(errors.contains("variant 1 needs a name"));
    }

    #[test]
    fn excluded_variants_skip_quantity_and_vat_checks() {
        let (mut sheet, _) = ready_sheet();
        let other = test_variant_id();
        edit(
            &mut sheet,
            SheetEdit::AddVariant {
                variant_id: other,
                name: "Hardcover".to_string(),
            },
        );
        bind(&mut sheet, other, Some(true));
        assert!(validate_for_submit(&sheet).is_err());

        edit(
            &mut sheet,
            SheetEdit::SetIncluded {
                variant_id: other,
                included: false,
            },
        );
        assert_eq!(validate_for_submit(&sheet), Ok(()));
    }

    #[test]
    fn mixing_exempt_and_taxable_is_rejected() {
        let (mut sheet, _) = ready_sheet();
        let other = test_variant_id();
        edit(
            &mut sheet,
            SheetEdit::AddVariant {
                variant_id: other,
                name: "Hymn Book".to_string(),
            },
        );
        edit(
            &mut sheet,
            SheetEdit::SetQuantity {
                variant_id: other,
                quantity: 100.0,
            },
        );
        bind(&mut sheet, other, Some(true));
        let errors = validate_for_submit(&sheet).unwrap_err();
        assert!(errors.contains("cannot mix exempt and taxable items in one document"));
    }

    #[test]
    fn exempt_variant_with_tax_is_rejected() {
        let (mut sheet, variant_id) = ready_sheet();
        bind(&mut sheet, variant_id, Some(true));
        edit(
            &mut sheet,
            SheetEdit::SetTaxPercent {
                variant_id,
                percent: 18.0,
            },
        );
        let errors = validate_for_submit(&sheet).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.issues()[0].contains("must have a tax rate of 0%"));
    }

    #[test]
    fn unknown_next_to_known_is_rejected() {
        let (mut sheet, _) = ready_sheet();
        let other = test_variant_id();
        edit(
            &mut sheet,
            SheetEdit::AddVariant {
                variant_id: other,
                name: "Loose sheets".to_string(),
            },
        );
        edit(
            &mut sheet,
            SheetEdit::SetQuantity {
                variant_id: other,
                quantity: 10.0,
            },
        );
        let errors = validate_for_submit(&sheet).unwrap_err();
        assert!(errors.contains("select a product for all items to enforce VAT rules"));
    }

    #[test]
    fn submit_persists_json_and_restores() {
        let (sheet, _) = ready_sheet();
        let store = InMemoryCostingStore::new();
        let id = submit(&sheet, &store).unwrap();
        assert_eq!(id, sheet.id_typed());
        assert!(store.raw(id).unwrap().unwrap().contains("\"paper\""));
        assert_eq!(store.len().unwrap(), 1);

        let restored = load_sheet(&store, id).unwrap().unwrap();
        assert_eq!(restored, sheet);
    }

    #[test]
    fn rejected_submit_writes_nothing() {
        let (mut sheet, variant_id) = ready_sheet();
        edit(
            &mut sheet,
            SheetEdit::SetQuantity {
                variant_id,
                quantity: 0.0,
            },
        );
        let store = InMemoryCostingStore::new();
        let err = submit(&sheet, &store).unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(_)));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn stale_write_is_rejected() {
        let (sheet, variant_id) = ready_sheet();
        let store = InMemoryCostingStore::new();
        let stale = sheet.clone();

        let mut newer = sheet;
        edit(
            &mut newer,
            SheetEdit::SetProfitMargin {
                variant_id,
                percent: 20.0,
            },
        );
        submit(&newer, &store).unwrap();

        let err = submit(&stale, &store).unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Store(StoreError::StaleVersion { .. })
        ));
    }

    #[test]
    fn inconsistent_record_fails_to_load() {
        let (sheet, _) = ready_sheet();
        let store = InMemoryCostingStore::new();
        let mut record = sheet.to_record();
        record.variants[0].is_locked = true;
        store.save(&record).unwrap();

        let err = load_sheet(&store, sheet.id_typed()).unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent { .. }));
    }

    #[test]
    fn poisoned_store_reports_storage_errors_everywhere() {
        let (sheet, _) = ready_sheet();
        let store = InMemoryCostingStore::arc();
        store.save(&sheet.to_record()).unwrap();

        let holder = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = holder.documents.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        let id = sheet.id_typed();
        assert!(matches!(store.len(), Err(StoreError::Storage(_))));
        assert!(matches!(store.is_empty(), Err(StoreError::Storage(_))));
        assert!(matches!(store.raw(id), Err(StoreError::Storage(_))));
        assert!(matches!(store.load(id), Err(StoreError::Storage(_))));
        assert!(matches!(
            store.save(&sheet.to_record()),
            Err(StoreError::Storage(_))
        ));
    }

    #[test]
    fn missing_sheet_loads_as_none() {
        let store = InMemoryCostingStore::arc();
        let id = CostingSheetId::new(AggregateId::new());
        assert!(load_sheet(&store, id).unwrap().is_none());
    }
}
