//! VAT consistency across the items of one commercial document.
//!
//! Rules are enforced at submission time only; while editing, a sheet may be
//! transiently inconsistent. Ambiguous combinations are rejected rather than
//! guessed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// VAT classification of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VatStatus {
    Exempt,
    Taxable,
    Unknown,
}

impl VatStatus {
    /// `Some(true)` exempt, `Some(false)` taxable, `None` unknown.
    pub fn from_flag(is_exempt: Option<bool>) -> Self {
        match is_exempt {
            Some(true) => VatStatus::Exempt,
            Some(false) => VatStatus::Taxable,
            None => VatStatus::Unknown,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            VatStatus::Exempt => Some(true),
            VatStatus::Taxable => Some(false),
            VatStatus::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != VatStatus::Unknown
    }
}

/// What kinds of items a document contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VatSummary {
    pub has_exempt: bool,
    pub has_taxable: bool,
    pub has_unknown: bool,
}

impl VatSummary {
    /// Every known item is exempt (and at least one is known).
    pub fn all_known_exempt(&self) -> bool {
        self.has_exempt && !self.has_taxable
    }

    /// Every known item is taxable (and at least one is known).
    pub fn all_known_taxable(&self) -> bool {
        self.has_taxable && !self.has_exempt
    }
}

/// Summarize the VAT classification of a set of items.
pub fn check_vat_consistency<I>(items: I) -> VatSummary
where
    I: IntoIterator<Item = VatStatus>,
{
    items
        .into_iter()
        .fold(VatSummary::default(), |mut summary, status| {
            match status {
                VatStatus::Exempt => summary.has_exempt = true,
                VatStatus::Taxable => summary.has_taxable = true,
                VatStatus::Unknown => summary.has_unknown = true,
            }
            summary
        })
}

/// A VAT rule a document breaks.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VatViolation {
    #[error("cannot mix exempt and taxable items in one document")]
    MixedExemptAndTaxable,

    #[error("select a product for all items to enforce VAT rules")]
    UnresolvedProducts,

    #[error("VAT-exempt items must have a tax rate of 0% (found {tax_percent}%)")]
    ExemptWithTax { tax_percent: f64 },

    #[error("taxable items require a tax rate above 0%")]
    TaxableWithoutTax,
}

/// Classification-only rules: no exempt/taxable mix, no known/unknown mix.
pub fn check_classification(summary: &VatSummary) -> Result<(), VatViolation> {
    if summary.has_exempt && summary.has_taxable {
        return Err(VatViolation::MixedExemptAndTaxable);
    }
    if summary.has_unknown && (summary.has_exempt || summary.has_taxable) {
        return Err(VatViolation::UnresolvedProducts);
    }
    Ok(())
}

/// Rate rule for one rate applied to items of the given summary.
pub fn check_rate(summary: &VatSummary, tax_percent: f64) -> Result<(), VatViolation> {
    if summary.all_known_exempt() && tax_percent != 0.0 {
        return Err(VatViolation::ExemptWithTax { tax_percent });
    }
    if summary.all_known_taxable() && tax_percent <= 0.0 {
        return Err(VatViolation::TaxableWithoutTax);
    }
    Ok(())
}

/// Full rule set for a document carrying a single tax rate.
///
/// All-unknown documents pass: there is nothing to enforce.
pub fn enforce_vat_rules(summary: &VatSummary, document_tax_percent: f64) -> Result<(), VatViolation> {
    check_classification(summary)?;
    check_rate(summary, document_tax_percent)
}
