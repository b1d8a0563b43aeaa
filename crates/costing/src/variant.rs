use serde::{Deserialize, Serialize};

use printerp_core::{AggregateId, DomainError, DomainResult, Entity, ValueObject};
use printerp_products::{FinishedProduct, ProductId, default_tax_percent};

use crate::component::{ComponentRow, ComponentType};
use crate::totals::{PricingParameters, Totals, compute_totals};
use crate::vat::VatStatus;

/// Costing variant identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(pub AggregateId);

impl VariantId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for VariantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a downstream quotation or order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub AggregateId);

impl DocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkedDocumentKind {
    Quotation,
    Order,
}

impl core::fmt::Display for LinkedDocumentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkedDocumentKind::Quotation => f.write_str("quotation"),
            LinkedDocumentKind::Order => f.write_str("order"),
        }
    }
}

/// The persisted quotation/order line that froze a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub kind: LinkedDocumentKind,
    pub document_id: DocumentId,
    /// Human-facing number (e.g. "QT-0042"), always displayable.
    pub document_number: String,
}

impl ValueObject for DocumentLink {}

impl DocumentLink {
    pub fn quotation(document_id: DocumentId, number: impl Into<String>) -> Self {
        Self {
            kind: LinkedDocumentKind::Quotation,
            document_id,
            document_number: number.into(),
        }
    }

    pub fn order(document_id: DocumentId, number: impl Into<String>) -> Self {
        Self {
            kind: LinkedDocumentKind::Order,
            document_id,
            document_number: number.into(),
        }
    }
}

/// Lifecycle of a variant. `Editable → Locked` only; there is no unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum VariantState {
    Editable,
    Locked(DocumentLink),
}

/// Result of a user edit on a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The variant is locked; nothing changed.
    IgnoredLocked,
}

fn ensure_amount(field: &str, value: f64) -> DomainResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(())
}

/// One priced alternative of a costing sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct CostingVariant {
    id: VariantId,
    name: String,
    finished_product_id: Option<ProductId>,
    product_vat_exempt: Option<bool>,
    components: Vec<ComponentRow>,
    pricing: PricingParameters,
    tax_percent_explicit: bool,
    totals: Totals,
    state: VariantState,
    is_included: bool,
}

impl CostingVariant {
    /// Editable, included variant with the 15 standard zero-cost rows.
    pub fn new(id: VariantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            finished_product_id: None,
            product_vat_exempt: None,
            components: ComponentRow::standard_set(),
            pricing: PricingParameters::default(),
            tax_percent_explicit: false,
            totals: Totals::default(),
            state: VariantState::Editable,
            is_included: true,
        }
    }

    /// Reassemble a variant from persisted parts. Totals are taken as given.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: VariantId,
        name: String,
        finished_product_id: Option<ProductId>,
        product_vat_exempt: Option<bool>,
        components: Vec<ComponentRow>,
        pricing: PricingParameters,
        tax_percent_explicit: bool,
        totals: Totals,
        state: VariantState,
        is_included: bool,
    ) -> Self {
        Self {
            id,
            name,
            finished_product_id,
            product_vat_exempt,
            components,
            pricing,
            tax_percent_explicit,
            totals,
            state,
            is_included,
        }
    }

    pub fn id_typed(&self) -> VariantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn finished_product_id(&self) -> Option<ProductId> {
        self.finished_product_id
    }

    pub fn product_vat_exempt(&self) -> Option<bool> {
        self.product_vat_exempt
    }

    pub fn components(&self) -> &[ComponentRow] {
        &self.components
    }

    pub fn component(&self, component_type: ComponentType) -> Option<&ComponentRow> {
        self.components
            .iter()
            .find(|row| row.component_type() == component_type)
    }

    pub fn pricing(&self) -> PricingParameters {
        self.pricing
    }

    pub fn quantity(&self) -> f64 {
        self.pricing.quantity
    }

    pub fn profit_margin_percent(&self) -> f64 {
        self.pricing.profit_margin_percent
    }

    pub fn tax_percent(&self) -> f64 {
        self.pricing.tax_percent
    }

    pub fn tax_percent_explicit(&self) -> bool {
        self.tax_percent_explicit
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn state(&self) -> &VariantState {
        &self.state
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, VariantState::Locked(_))
    }

    /// The document a locked variant belongs to.
    pub fn link(&self) -> Option<&DocumentLink> {
        match &self.state {
            VariantState::Locked(link) => Some(link),
            VariantState::Editable => None,
        }
    }

    pub fn is_included(&self) -> bool {
        self.is_included
    }

    /// Known only when bound to a product with an explicit flag, or when a
    /// tax rate was chosen explicitly (0% exempt, otherwise taxable).
    pub fn vat_status(&self) -> VatStatus {
        if self.finished_product_id.is_some() {
            if let Some(exempt) = self.product_vat_exempt {
                return VatStatus::from_flag(Some(exempt));
            }
        }
        if self.tax_percent_explicit {
            return VatStatus::from_flag(Some(self.pricing.tax_percent == 0.0));
        }
        VatStatus::Unknown
    }

    fn guard(&self, edit: &str) -> bool {
        if let VariantState::Locked(link) = &self.state {
            tracing::debug!(
                variant_id = %self.id,
                edit,
                linked_to = %link.kind,
                document_number = %link.document_number,
                "edit ignored on locked variant"
            );
            return false;
        }
        true
    }

    fn recompute(&mut self) {
        self.totals = compute_totals(
            self.components.iter().map(ComponentRow::contribution),
            &self.pricing,
        );
    }

    fn row_mut(&mut self, component_type: ComponentType) -> DomainResult<&mut ComponentRow> {
        self.components
            .iter_mut()
            .find(|row| row.component_type() == component_type)
            .ok_or_else(|| DomainError::invariant(format!("missing {component_type} row")))
    }

    pub fn rename(&mut self, name: impl Into<String>) -> EditOutcome {
        if !self.guard("rename") {
            return EditOutcome::IgnoredLocked;
        }
        self.name = name.into();
        EditOutcome::Applied
    }

    /// Commit a formula for one component and recompute totals. Formula
    /// errors are recorded on the row, not returned.
    pub fn commit_formula(
        &mut self,
        component_type: ComponentType,
        raw: &str,
    ) -> DomainResult<EditOutcome> {
        if !self.guard("commit_formula") {
            return Ok(EditOutcome::IgnoredLocked);
        }
        self.row_mut(component_type)?.commit_formula(raw);
        self.recompute();
        Ok(EditOutcome::Applied)
    }

    pub fn set_component_active(
        &mut self,
        component_type: ComponentType,
        active: bool,
    ) -> DomainResult<EditOutcome> {
        if !self.guard("set_component_active") {
            return Ok(EditOutcome::IgnoredLocked);
        }
        self.row_mut(component_type)?.set_active(active);
        self.recompute();
        Ok(EditOutcome::Applied)
    }

    pub fn set_quantity(&mut self, quantity: f64) -> DomainResult<EditOutcome> {
        if !self.guard("set_quantity") {
            return Ok(EditOutcome::IgnoredLocked);
        }
        ensure_amount("quantity", quantity)?;
        self.pricing.quantity = quantity;
        self.recompute();
        Ok(EditOutcome::Applied)
    }

    pub fn set_profit_margin(&mut self, percent: f64) -> DomainResult<EditOutcome> {
        if !self.guard("set_profit_margin") {
            return Ok(EditOutcome::IgnoredLocked);
        }
        ensure_amount("profit margin", percent)?;
        self.pricing.profit_margin_percent = percent;
        self.recompute();
        Ok(EditOutcome::Applied)
    }

    /// Explicitly chosen tax rate; this also makes the VAT status known.
    pub fn set_tax_percent(&mut self, percent: f64) -> DomainResult<EditOutcome> {
        if !self.guard("set_tax_percent") {
            return Ok(EditOutcome::IgnoredLocked);
        }
        ensure_amount("tax percent", percent)?;
        self.pricing.tax_percent = percent;
        self.tax_percent_explicit = true;
        self.recompute();
        Ok(EditOutcome::Applied)
    }

    /// Bind a finished product: name, exemption flag and default tax follow it.
    pub fn bind_product(&mut self, product: &FinishedProduct, default_tax: f64) -> EditOutcome {
        if !self.guard("bind_product") {
            return EditOutcome::IgnoredLocked;
        }
        self.finished_product_id = Some(product.id);
        self.product_vat_exempt = product.is_vat_exempt;
        self.name = product.name.clone();
        self.pricing.tax_percent = default_tax_percent(product, default_tax);
        self.tax_percent_explicit = false;
        self.recompute();
        EditOutcome::Applied
    }

    /// Back to a free-text variant. Name and tax rate are kept.
    pub fn unbind_product(&mut self) -> EditOutcome {
        if !self.guard("unbind_product") {
            return EditOutcome::IgnoredLocked;
        }
        self.finished_product_id = None;
        self.product_vat_exempt = None;
        EditOutcome::Applied
    }

    /// Always allowed, locked or not.
    pub fn set_included(&mut self, included: bool) -> EditOutcome {
        self.is_included = included;
        EditOutcome::Applied
    }

    /// `Editable → Locked`, done when a persisted quotation or order line
    /// references this variant.
    pub fn link_to_document(&mut self, link: DocumentLink) -> DomainResult<()> {
        if let VariantState::Locked(existing) = &self.state {
            return Err(DomainError::conflict(format!(
                "variant {} is already linked to {} {}",
                self.id, existing.kind, existing.document_number
            )));
        }
        if link.document_number.trim().is_empty() {
            return Err(DomainError::validation(
                "linked document number is required",
            ));
        }
        tracing::info!(
            variant_id = %self.id,
            linked_to = %link.kind,
            document_number = %link.document_number,
            "variant locked"
        );
        self.state = VariantState::Locked(link);
        Ok(())
    }

    /// Editable copy with a fresh identity. Formulas are copied verbatim and
    /// evaluated again, so costs and totals are recomputed rather than copied.
    pub fn duplicate(&self, new_id: VariantId, name_suffix: &str) -> CostingVariant {
        let mut copy = CostingVariant::new(new_id, format!("{}{}", self.name, name_suffix));
        copy.finished_product_id = self.finished_product_id;
        copy.product_vat_exempt = self.product_vat_exempt;
        copy.pricing = self.pricing;
        copy.tax_percent_explicit = self.tax_percent_explicit;
        copy.components = self
            .components
            .iter()
            .map(|source| {
                let mut row = ComponentRow::restore(
                    source.component_type(),
                    source.formula().to_string(),
                    0.0,
                    source.is_active(),
                    None,
                );
                row.reevaluate();
                row
            })
            .collect();
        copy.recompute();
        copy
    }
}

impl Entity for CostingVariant {
    type Id = VariantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
