use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use printerp_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Entity};
use printerp_products::FinishedProduct;

use crate::component::ComponentType;
use crate::variant::{CostingVariant, DocumentLink, VariantId};

/// Name given to the variant a new sheet starts with.
pub const DEFAULT_VARIANT_NAME: &str = "Variant 1";

/// Costing sheet identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostingSheetId(pub AggregateId);

impl CostingSheetId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CostingSheetId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: CostingSheet (one print job estimate, one or more variants).
#[derive(Debug, Clone, PartialEq)]
pub struct CostingSheet {
    id: CostingSheetId,
    name: String,
    variants: Vec<CostingVariant>,
    version: u64,
}

impl CostingSheet {
    /// New in-memory sheet with one default, zero-cost variant.
    pub fn new(id: CostingSheetId, name: impl Into<String>, first_variant: VariantId) -> Self {
        Self {
            id,
            name: name.into(),
            variants: vec![CostingVariant::new(first_variant, DEFAULT_VARIANT_NAME)],
            version: 0,
        }
    }

    pub(crate) fn restore(
        id: CostingSheetId,
        name: String,
        variants: Vec<CostingVariant>,
        version: u64,
    ) -> Self {
        Self {
            id,
            name,
            variants,
            version,
        }
    }

    pub fn id_typed(&self) -> CostingSheetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[CostingVariant] {
        &self.variants
    }

    pub fn variant(&self, id: VariantId) -> Option<&CostingVariant> {
        self.variants.iter().find(|v| *v.id() == id)
    }

    pub fn included_variants(&self) -> impl Iterator<Item = &CostingVariant> {
        self.variants.iter().filter(|v| v.is_included())
    }

    pub fn has_locked_variants(&self) -> bool {
        self.variants.iter().any(CostingVariant::is_locked)
    }

    fn variant_mut(&mut self, id: VariantId) -> Option<&mut CostingVariant> {
        self.variants.iter_mut().find(|v| *v.id() == id)
    }
}

impl AggregateRoot for CostingSheet {
    type Id = CostingSheetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// A user edit on a costing sheet. Commands and events carry the same edit:
/// the command asks for it, the event records that it was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SheetEdit {
    RenameSheet {
        name: String,
    },
    AddVariant {
        variant_id: VariantId,
        name: String,
    },
    CloneVariant {
        source_id: VariantId,
        new_id: VariantId,
        name_suffix: String,
    },
    RemoveVariant {
        variant_id: VariantId,
    },
    RenameVariant {
        variant_id: VariantId,
        name: String,
    },
    CommitFormula {
        variant_id: VariantId,
        component: ComponentType,
        formula: String,
    },
    SetComponentActive {
        variant_id: VariantId,
        component: ComponentType,
        active: bool,
    },
    SetQuantity {
        variant_id: VariantId,
        quantity: f64,
    },
    SetProfitMargin {
        variant_id: VariantId,
        percent: f64,
    },
    SetTaxPercent {
        variant_id: VariantId,
        percent: f64,
    },
    BindFinishedProduct {
        variant_id: VariantId,
        product: FinishedProduct,
        default_tax_percent: f64,
    },
    UnbindFinishedProduct {
        variant_id: VariantId,
    },
    SetIncluded {
        variant_id: VariantId,
        included: bool,
    },
    LinkVariant {
        variant_id: VariantId,
        link: DocumentLink,
    },
}

impl SheetEdit {
    /// The variant an edit targets, if any. For clones, the source.
    pub fn variant_id(&self) -> Option<VariantId> {
        match self {
            SheetEdit::RenameSheet { .. } => None,
            SheetEdit::AddVariant { variant_id, .. }
            | SheetEdit::RemoveVariant { variant_id }
            | SheetEdit::RenameVariant { variant_id, .. }
            | SheetEdit::CommitFormula { variant_id, .. }
            | SheetEdit::SetComponentActive { variant_id, .. }
            | SheetEdit::SetQuantity { variant_id, .. }
            | SheetEdit::SetProfitMargin { variant_id, .. }
            | SheetEdit::SetTaxPercent { variant_id, .. }
            | SheetEdit::BindFinishedProduct { variant_id, .. }
            | SheetEdit::UnbindFinishedProduct { variant_id }
            | SheetEdit::SetIncluded { variant_id, .. }
            | SheetEdit::LinkVariant { variant_id, .. } => Some(*variant_id),
            SheetEdit::CloneVariant { source_id, .. } => Some(*source_id),
        }
    }

    /// Inclusion is the only per-variant field a locked variant still accepts.
    fn allowed_when_locked(&self) -> bool {
        matches!(self, SheetEdit::SetIncluded { .. })
    }

    fn numeric_input(&self) -> Option<(&'static str, f64)> {
        match self {
            SheetEdit::SetQuantity { quantity, .. } => Some(("quantity", *quantity)),
            SheetEdit::SetProfitMargin { percent, .. } => Some(("profit margin", *percent)),
            SheetEdit::SetTaxPercent { percent, .. } => Some(("tax percent", *percent)),
            SheetEdit::BindFinishedProduct {
                default_tax_percent,
                ..
            } => Some(("default tax percent", *default_tax_percent)),
            _ => None,
        }
    }
}

/// Command: apply an edit to a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostingCommand {
    pub sheet_id: CostingSheetId,
    pub edit: SheetEdit,
    pub occurred_at: DateTime<Utc>,
}

impl CostingCommand {
    pub fn new(sheet_id: CostingSheetId, edit: SheetEdit) -> Self {
        Self {
            sheet_id,
            edit,
            occurred_at: Utc::now(),
        }
    }
}

/// Event: an accepted edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostingEvent {
    pub sheet_id: CostingSheetId,
    pub edit: SheetEdit,
    pub occurred_at: DateTime<Utc>,
}

impl CostingEvent {
    /// Stable event name (e.g. "costing.variant.formula_committed").
    pub fn event_type(&self) -> &'static str {
        match self.edit {
            SheetEdit::RenameSheet { .. } => "costing.sheet.renamed",
            SheetEdit::AddVariant { .. } => "costing.variant.added",
            SheetEdit::CloneVariant { .. } => "costing.variant.cloned",
            SheetEdit::RemoveVariant { .. } => "costing.variant.removed",
            SheetEdit::RenameVariant { .. } => "costing.variant.renamed",
            SheetEdit::CommitFormula { .. } => "costing.variant.formula_committed",
            SheetEdit::SetComponentActive { .. } => "costing.variant.component_toggled",
            SheetEdit::SetQuantity { .. } => "costing.variant.quantity_set",
            SheetEdit::SetProfitMargin { .. } => "costing.variant.profit_margin_set",
            SheetEdit::SetTaxPercent { .. } => "costing.variant.tax_percent_set",
            SheetEdit::BindFinishedProduct { .. } => "costing.variant.product_bound",
            SheetEdit::UnbindFinishedProduct { .. } => "costing.variant.product_unbound",
            SheetEdit::SetIncluded { .. } => "costing.variant.inclusion_set",
            SheetEdit::LinkVariant { .. } => "costing.variant.locked",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl Aggregate for CostingSheet {
    type Command = CostingCommand;
    type Event = CostingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        let applied = match &event.edit {
            SheetEdit::RenameSheet { name } => {
                self.name = name.clone();
                Ok(())
            }
            SheetEdit::AddVariant { variant_id, name } => {
                self.variants
                    .push(CostingVariant::new(*variant_id, name.clone()));
                Ok(())
            }
            SheetEdit::CloneVariant {
                source_id,
                new_id,
                name_suffix,
            } => {
                let copy = self
                    .variant(*source_id)
                    .map(|source| source.duplicate(*new_id, name_suffix));
                match copy {
                    Some(copy) => {
                        self.variants.push(copy);
                        Ok(())
                    }
                    None => Err(DomainError::not_found()),
                }
            }
            SheetEdit::RemoveVariant { variant_id } => {
                self.variants.retain(|v| v.id() != variant_id);
                Ok(())
            }
            edit => match edit.variant_id().and_then(|id| self.variant_mut(id)) {
                Some(variant) => apply_to_variant(variant, edit),
                None => Err(DomainError::not_found()),
            },
        };

        if let Err(err) = applied {
            tracing::error!(
                sheet_id = %self.id,
                event_type = event.event_type(),
                error = %err,
                "costing event could not be applied"
            );
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if command.sheet_id != self.id {
            return Err(DomainError::invariant("sheet_id mismatch"));
        }

        let edit = &command.edit;
        if let Some((field, value)) = edit.numeric_input() {
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::validation(format!(
                    "{field} must be a non-negative number"
                )));
            }
        }

        match edit {
            SheetEdit::RenameSheet { .. } => {}
            SheetEdit::AddVariant { variant_id, .. } => self.ensure_new_variant(*variant_id)?,
            SheetEdit::CloneVariant {
                source_id, new_id, ..
            } => {
                self.ensure_variant(*source_id)?;
                self.ensure_new_variant(*new_id)?;
            }
            SheetEdit::RemoveVariant { variant_id } => {
                let variant = self.ensure_variant(*variant_id)?;
                if let Some(link) = variant.link() {
                    return Err(DomainError::invariant(format!(
                        "cannot remove a variant linked to {} {}",
                        link.kind, link.document_number
                    )));
                }
                if self.variants.len() == 1 {
                    return Err(DomainError::validation(
                        "a costing sheet needs at least one variant",
                    ));
                }
            }
            SheetEdit::LinkVariant { variant_id, link } => {
                let variant = self.ensure_variant(*variant_id)?;
                if let Some(existing) = variant.link() {
                    return Err(DomainError::conflict(format!(
                        "variant {variant_id} is already linked to {} {}",
                        existing.kind, existing.document_number
                    )));
                }
                if link.document_number.trim().is_empty() {
                    return Err(DomainError::validation(
                        "linked document number is required",
                    ));
                }
            }
            other => {
                let variant_id = other.variant_id().ok_or_else(DomainError::not_found)?;
                let variant = self.ensure_variant(variant_id)?;
                if variant.is_locked() && !other.allowed_when_locked() {
                    tracing::debug!(
                        sheet_id = %self.id,
                        variant_id = %variant_id,
                        "edit on locked variant ignored"
                    );
                    return Ok(Vec::new());
                }
            }
        }

        Ok(vec![CostingEvent {
            sheet_id: command.sheet_id,
            edit: edit.clone(),
            occurred_at: command.occurred_at,
        }])
    }
}

impl CostingSheet {
    fn ensure_variant(&self, id: VariantId) -> Result<&CostingVariant, DomainError> {
        self.variant(id).ok_or_else(DomainError::not_found)
    }

    fn ensure_new_variant(&self, id: VariantId) -> Result<(), DomainError> {
        if self.variant(id).is_some() {
            return Err(DomainError::conflict(format!("variant {id} already exists")));
        }
        Ok(())
    }
}

fn apply_to_variant(variant: &mut CostingVariant, edit: &SheetEdit) -> Result<(), DomainError> {
    match edit {
        SheetEdit::RenameVariant { name, .. } => {
            variant.rename(name.clone());
        }
        SheetEdit::CommitFormula {
            component, formula, ..
        } => {
            variant.commit_formula(*component, formula)?;
        }
        SheetEdit::SetComponentActive {
            component, active, ..
        } => {
            variant.set_component_active(*component, *active)?;
        }
        SheetEdit::SetQuantity { quantity, .. } => {
            variant.set_quantity(*quantity)?;
        }
        SheetEdit::SetProfitMargin { percent, .. } => {
            variant.set_profit_margin(*percent)?;
        }
        SheetEdit::SetTaxPercent { percent, .. } => {
            variant.set_tax_percent(*percent)?;
        }
        SheetEdit::BindFinishedProduct {
            product,
            default_tax_percent,
            ..
        } => {
            variant.bind_product(product, *default_tax_percent);
        }
        SheetEdit::UnbindFinishedProduct { .. } => {
            variant.unbind_product();
        }
        SheetEdit::SetIncluded { included, .. } => {
            variant.set_included(*included);
        }
        SheetEdit::LinkVariant { link, .. } => {
            variant.link_to_document(link.clone())?;
        }
        SheetEdit::RenameSheet { .. }
        | SheetEdit::AddVariant { .. }
        | SheetEdit::CloneVariant { .. }
        | SheetEdit::RemoveVariant { .. } => {}
    }
    Ok(())
}
