use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use printerp_core::{Aggregate, AggregateId};
use printerp_costing::{
    ComponentType, CostingCommand, CostingSheet, CostingSheetId, PricingParameters, SheetEdit,
    VariantId, compute_totals, evaluate,
};

const FORMULAS: [&str; 6] = [
    "32*120",
    "(4*250)+(2*75.5)",
    "1500/3",
    "-(12.5*8)",
    "((((1+2)*3)-4)/5)",
    "2*450+3*(100-20)",
];

fn priced_sheet() -> (CostingSheet, VariantId) {
    let variant_id = VariantId::new(AggregateId::new());
    let mut sheet = CostingSheet::new(CostingSheetId::new(AggregateId::new()), "Bench", variant_id);
    for (component, formula) in ComponentType::ALL.iter().zip(FORMULAS.iter().cycle()) {
        let cmd = CostingCommand::new(
            sheet.id_typed(),
            SheetEdit::CommitFormula {
                variant_id,
                component: *component,
                formula: formula.to_string(),
            },
        );
        sheet.execute(&cmd).unwrap();
    }
    (sheet, variant_id)
}

fn bench_formula_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("formula_evaluation");
    for formula in FORMULAS {
        group.bench_with_input(BenchmarkId::from_parameter(formula), formula, |b, f| {
            b.iter(|| evaluate(black_box(f)).unwrap());
        });
    }
    group.finish();
}

fn bench_compute_totals(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_totals");
    let params = PricingParameters {
        quantity: 3000.0,
        profit_margin_percent: 20.0,
        tax_percent: 18.0,
    };
    for rows in [1usize, 15, 150] {
        let costs: Vec<f64> = (0..rows).map(|i| 100.0 + i as f64 * 12.5).collect();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &costs, |b, costs| {
            b.iter(|| compute_totals(costs.iter().copied(), black_box(&params)));
        });
    }
    group.finish();
}

fn bench_commit_formula_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_formula_command");

    // Full edit path: handle, apply, row evaluation, variant recompute.
    group.bench_function("priced_variant", |b| {
        let (mut sheet, variant_id) = priced_sheet();
        b.iter(|| {
            let cmd = CostingCommand {
                sheet_id: sheet.id_typed(),
                edit: SheetEdit::CommitFormula {
                    variant_id,
                    component: ComponentType::Paper,
                    formula: black_box("32*120".to_string()),
                },
                occurred_at: Utc::now(),
            };
            sheet.execute(&cmd).unwrap();
        });
    });

    group.bench_function("clone_variant", |b| {
        let (sheet, source_id) = priced_sheet();
        b.iter(|| {
            let mut sheet = sheet.clone();
            let cmd = CostingCommand::new(
                sheet.id_typed(),
                SheetEdit::CloneVariant {
                    source_id,
                    new_id: VariantId::new(AggregateId::new()),
                    name_suffix: " - Copy".to_string(),
                },
            );
            sheet.execute(&cmd).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_formula_evaluation,
    bench_compute_totals,
    bench_commit_formula_command
);
criterion_main!(benches);
