//! Lines handed to quotation and sales-order builders.
//!
//! A document receives one line per included variant, priced before VAT.
//! Formulas and component detail stay inside the costing sheet.

use serde::{Deserialize, Serialize};

use crate::config::CostingConfig;
use crate::sheet::CostingSheet;
use crate::submission::included_vat_summary;
use crate::variant::{CostingVariant, VariantId};
use crate::vat::{VatStatus, VatViolation, check_classification, check_vat_consistency};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub variant_id: VariantId,
    pub description: String,
    pub quantity: f64,
    pub unit_price_ex_vat: f64,
    pub vat_status: VatStatus,
}

impl DocumentLine {
    pub fn line_total_ex_vat(&self) -> f64 {
        self.quantity * self.unit_price_ex_vat
    }
}

impl From<&CostingVariant> for DocumentLine {
    fn from(variant: &CostingVariant) -> Self {
        Self {
            variant_id: variant.id_typed(),
            description: variant.name().to_string(),
            quantity: variant.quantity(),
            unit_price_ex_vat: variant.totals().unit_price_ex_vat,
            vat_status: variant.vat_status(),
        }
    }
}

/// Lines for every included variant, in sheet order. A sheet whose
/// included variants cannot share one document is refused.
pub fn document_lines(sheet: &CostingSheet) -> Result<Vec<DocumentLine>, VatViolation> {
    check_classification(&included_vat_summary(sheet))?;
    Ok(sheet.included_variants().map(DocumentLine::from).collect())
}

/// Tax rate a new document should start with: 0 when every line is
/// exempt, otherwise the configured default.
pub fn document_tax_percent(lines: &[DocumentLine], config: &CostingConfig) -> f64 {
    let summary = check_vat_consistency(lines.iter().map(|line| line.vat_status));
    if summary.all_known_exempt() && !summary.has_unknown {
        0.0
    } else {
        config.default_tax_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printerp_core::{Aggregate, AggregateId};
    use printerp_products::{FinishedProduct, ProductId};

    use crate::component::ComponentType;
    use crate::sheet::{CostingCommand, CostingSheetId, SheetEdit};
    use crate::vat::enforce_vat_rules;

    fn edit(sheet: &mut CostingSheet, edit: SheetEdit) {
        let cmd = CostingCommand::new(sheet.id_typed(), edit);
        sheet.execute(&cmd).unwrap();
    }

    fn priced_sheet(exempt: Option<bool>) -> (CostingSheet, VariantId) {
        let variant_id = VariantId::new(AggregateId::new());
        let mut sheet = CostingSheet::new(
            CostingSheetId::new(AggregateId::new()),
            "Wall Calendars",
            variant_id,
        );
        for e in [
            SheetEdit::CommitFormula {
                variant_id,
                component: ComponentType::Printing,
                formula: "1000".to_string(),
            },
            SheetEdit::SetQuantity {
                variant_id,
                quantity: 100.0,
            },
            SheetEdit::SetProfitMargin {
                variant_id,
                percent: 10.0,
            },
            SheetEdit::BindFinishedProduct {
                variant_id,
                product: FinishedProduct::new(
                    ProductId::new(AggregateId::new()),
                    "Calendar A3",
                    exempt,
                ),
                default_tax_percent: 10.0,
            },
        ] {
            edit(&mut sheet, e);
        }
        (sheet, variant_id)
    }

    #[test]
    fn lines_carry_ex_vat_price() {
        let (sheet, variant_id) = priced_sheet(Some(false));
        let lines = document_lines(&sheet).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].variant_id, variant_id);
        assert_eq!(lines[0].description, "Calendar A3");
        assert_eq!(lines[0].quantity, 100.0);
        assert_eq!(lines[0].unit_price_ex_vat, 11.0);
        assert_eq!(lines[0].line_total_ex_vat(), 1100.0);
        assert_eq!(lines[0].vat_status, VatStatus::Taxable);
    }

    #[test]
    fn excluded_variants_are_skipped() {
        let (mut sheet, variant_id) = priced_sheet(Some(false));
        edit(
            &mut sheet,
            SheetEdit::SetIncluded {
                variant_id,
                included: false,
            },
        );
        assert!(document_lines(&sheet).unwrap().is_empty());
    }

    #[test]
    fn mixed_sheet_is_refused() {
        let (mut sheet, _) = priced_sheet(Some(false));
        let other = VariantId::new(AggregateId::new());
        edit(
            &mut sheet,
            SheetEdit::AddVariant {
                variant_id: other,
                name: "Exempt edition".to_string(),
            },
        );
        edit(
            &mut sheet,
            SheetEdit::SetTaxPercent {
                variant_id: other,
                percent: 0.0,
            },
        );
        assert_eq!(
            document_lines(&sheet),
            Err(VatViolation::MixedExemptAndTaxable)
        );
    }

    #[test]
    fn suggested_rate_follows_exemption() {
        let config = CostingConfig::default();

        let (exempt, _) = priced_sheet(Some(true));
        let lines = document_lines(&exempt).unwrap();
        let rate = document_tax_percent(&lines, &config);
        assert_eq!(rate, 0.0);
        let summary = check_vat_consistency(lines.iter().map(|l| l.vat_status));
        assert_eq!(enforce_vat_rules(&summary, rate), Ok(()));

        let (taxable, _) = priced_sheet(Some(false));
        let lines = document_lines(&taxable).unwrap();
        assert_eq!(document_tax_percent(&lines, &config), 18.0);

        let (unknown, _) = priced_sheet(None);
        let lines = document_lines(&unknown).unwrap();
        assert_eq!(document_tax_percent(&lines, &config), 18.0);
    }
}
