use serde::{Deserialize, Serialize};

use crate::formula::{Evaluation, FormulaError, normalize_formula};

/// Cost category of a component row. The order of [`ComponentType::ALL`] is
/// the display and sort order of every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Paper,
    Board,
    Artwork,
    Plates,
    Printing,
    Ink,
    Blocks,
    Cutting,
    Folding,
    Binding,
    Misc,
    Transport,
    Discount,
    Lamination,
    Overheads,
}

impl ComponentType {
    pub const ALL: [ComponentType; 15] = [
        ComponentType::Paper,
        ComponentType::Board,
        ComponentType::Artwork,
        ComponentType::Plates,
        ComponentType::Printing,
        ComponentType::Ink,
        ComponentType::Blocks,
        ComponentType::Cutting,
        ComponentType::Folding,
        ComponentType::Binding,
        ComponentType::Misc,
        ComponentType::Transport,
        ComponentType::Discount,
        ComponentType::Lamination,
        ComponentType::Overheads,
    ];

    /// Position in [`ComponentType::ALL`].
    pub fn sort_order(self) -> u32 {
        self as u32
    }

    pub fn label(self) -> &'static str {
        match self {
            ComponentType::Paper => "Paper",
            ComponentType::Board => "Board",
            ComponentType::Artwork => "Artwork",
            ComponentType::Plates => "Plates",
            ComponentType::Printing => "Printing",
            ComponentType::Ink => "Ink",
            ComponentType::Blocks => "Blocks",
            ComponentType::Cutting => "Cutting",
            ComponentType::Folding => "Folding",
            ComponentType::Binding => "Binding",
            ComponentType::Misc => "Misc",
            ComponentType::Transport => "Transport",
            ComponentType::Discount => "Discount",
            ComponentType::Lamination => "Lamination",
            ComponentType::Overheads => "Overheads",
        }
    }
}

impl core::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// One cost line of a variant.
///
/// `calculated_cost` only changes through [`ComponentRow::commit_formula`] or
/// [`ComponentRow::reevaluate`], so it always matches `formula` as of the last
/// evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRow {
    component_type: ComponentType,
    formula: String,
    calculated_cost: f64,
    is_active: bool,
    error: Option<FormulaError>,
}

impl ComponentRow {
    /// Empty, active, zero-cost row.
    pub fn new(component_type: ComponentType) -> Self {
        Self {
            component_type,
            formula: String::new(),
            calculated_cost: 0.0,
            is_active: true,
            error: None,
        }
    }

    /// One row per component type, in sort order.
    pub fn standard_set() -> Vec<ComponentRow> {
        ComponentType::ALL.iter().copied().map(Self::new).collect()
    }

    /// Rebuild a row from persisted values without re-evaluating.
    pub(crate) fn restore(
        component_type: ComponentType,
        formula: String,
        calculated_cost: f64,
        is_active: bool,
        error: Option<FormulaError>,
    ) -> Self {
        Self {
            component_type,
            formula,
            calculated_cost,
            is_active,
            error,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn sort_order(&self) -> u32 {
        self.component_type.sort_order()
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn calculated_cost(&self) -> f64 {
        self.calculated_cost
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Error from the last evaluation, shown inline next to the row.
    pub fn error(&self) -> Option<&FormulaError> {
        self.error.as_ref()
    }

    /// Amount this row adds to the subtotal.
    pub fn contribution(&self) -> f64 {
        if self.is_active { self.calculated_cost } else { 0.0 }
    }

    /// Commit user input (on blur/enter): filter it, store it, evaluate it.
    pub fn commit_formula(&mut self, raw: &str) -> Evaluation {
        self.formula = normalize_formula(raw);
        self.reevaluate()
    }

    /// Evaluate the stored formula again. Invalid formulas cost 0.
    pub fn reevaluate(&mut self) -> Evaluation {
        let evaluation = Evaluation::of(&self.formula);
        self.calculated_cost = evaluation.cost();
        self.error = evaluation.error().cloned();
        if let Some(err) = &self.error {
            tracing::debug!(component = %self.component_type, formula = %self.formula, error = %err, "formula rejected");
        }
        evaluation
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_has_one_row_per_type_in_order() {
        let rows = ComponentRow::standard_set();
        assert_eq!(rows.len(), 15);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.sort_order(), i as u32);
            assert_eq!(row.calculated_cost(), 0.0);
            assert!(row.is_active());
        }
        assert_eq!(rows[0].component_type(), ComponentType::Paper);
        assert_eq!(rows[14].component_type(), ComponentType::Overheads);
    }

    #[test]
    fn commit_normalizes_and_evaluates() {
        let mut row = ComponentRow::new(ComponentType::Paper);
        let eval = row.commit_formula("32**120");
        assert_eq!(eval, Evaluation::Valid(3840.0));
        assert_eq!(row.formula(), "32*120");
        assert_eq!(row.calculated_cost(), 3840.0);
        assert!(row.error().is_none());
    }

    #[test]
    fn invalid_formula_zeroes_cost_and_keeps_error() {
        let mut row = ComponentRow::new(ComponentType::Plates);
        row.commit_formula("4*250");
        assert_eq!(row.calculated_cost(), 1000.0);

        row.commit_formula("4*(250");
        assert_eq!(row.calculated_cost(), 0.0);
        assert_eq!(row.formula(), "4*(250");
        assert!(matches!(
            row.error(),
            Some(FormulaError::UnbalancedParenthesis { .. })
        ));

        row.commit_formula("");
        assert_eq!(row.calculated_cost(), 0.0);
        assert!(row.error().is_none());
    }

    #[test]
    fn inactive_rows_contribute_nothing() {
        let mut row = ComponentRow::new(ComponentType::Lamination);
        row.commit_formula("150");
        row.set_active(false);
        assert_eq!(row.contribution(), 0.0);
        assert_eq!(row.calculated_cost(), 150.0);
        row.set_active(true);
        assert_eq!(row.contribution(), 150.0);
    }

    #[test]
    fn component_types_serialize_lowercase() {
        let json = serde_json::to_string(&ComponentType::Overheads).unwrap();
        assert_eq!(json, "\"overheads\"");
    }
}
