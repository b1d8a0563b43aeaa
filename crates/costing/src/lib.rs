//! Costing sheet calculation engine.
//!
//! Per-line formula evaluation, cascading totals, VAT consistency across
//! sibling variants and the lock lifecycle that ties a variant to a quotation
//! or sales order. Pure domain logic; persistence is a trait boundary.

pub mod component;
pub mod config;
pub mod document;
pub mod formula;
pub mod record;
pub mod sheet;
pub mod submission;
pub mod totals;
pub mod variant;
pub mod vat;

pub use component::{ComponentRow, ComponentType};
pub use config::CostingConfig;
pub use document::{DocumentLine, document_lines, document_tax_percent};
pub use formula::{Evaluation, FormulaError, evaluate, normalize_formula};
pub use record::{ComponentRecord, CostingSheetRecord, VariantRecord};
pub use sheet::{CostingCommand, CostingEvent, CostingSheet, CostingSheetId, SheetEdit};
pub use submission::{
    CostingSheetStore, InMemoryCostingStore, StoreError, SubmitError, load_sheet, submit,
    validate_for_submit,
};
pub use totals::{PricingParameters, Totals, compute_totals};
pub use variant::{
    CostingVariant, DocumentId, DocumentLink, EditOutcome, LinkedDocumentKind, VariantId,
    VariantState,
};
pub use vat::{VatStatus, VatSummary, VatViolation, check_vat_consistency, enforce_vat_rules};
