//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for sheet engine integration tests.

#![allow(dead_code)]

use sheet_engine::{CalculationMode, Cell, CellCoordinate, EngineConfig, RecalcReport, SheetModel};

/// Test harness wrapping a sheet model with address-based helpers.
pub struct TestHarness {
    pub sheet: SheetModel,
}

impl TestHarness {
    /// Create a new test harness with an empty sheet.
    pub fn new() -> Self {
        init_logging();
        TestHarness {
            sheet: SheetModel::new(),
        }
    }

    /// Create a harness whose sheet only recalculates on demand.
    pub fn manual() -> Self {
        Self::with_config(EngineConfig {
            calculation_mode: CalculationMode::Manual,
            ..EngineConfig::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_logging();
        TestHarness {
            sheet: SheetModel::with_config(config),
        }
    }

    /// Create a harness with the diamond fixture:
    /// A1 = 10, B1 = A1*2, C1 = A1+1, D1 = B1+C1.
    pub fn with_diamond() -> Self {
        let mut harness = Self::new();
        harness.set("A:1", "10");
        harness.set("B:1", "=A:1*2");
        harness.set("C:1", "=A:1+1");
        harness.set("D:1", "=B:1+C:1");
        harness
    }

    /// Types `input` into the cell at `address`.
    pub fn set(&mut self, address: &str, input: &str) -> RecalcReport {
        self.sheet
            .set_input(address, input)
            .unwrap_or_else(|e| panic!("set {}: {}", address, e))
    }

    pub fn value(&self, address: &str) -> f64 {
        self.sheet.value(at(address))
    }

    pub fn cell(&self, address: &str) -> Option<&Cell> {
        self.sheet.cell(at(address))
    }
}

/// Parses an address, panicking on bad test input.
pub fn at(address: &str) -> CellCoordinate {
    CellCoordinate::parse_address(address).unwrap_or_else(|| panic!("bad address {}", address))
}

/// Builds `(coordinate, cell)` pairs from typed inputs.
pub fn inputs(pairs: &[(&str, &str)]) -> Vec<(CellCoordinate, Cell)> {
    pairs
        .iter()
        .map(|(address, input)| (at(address), Cell::from_input(input)))
        .collect()
}

/// Routes engine logs to the test output when RUST_LOG is set.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Assert that a cell currently reads as `expected`.
pub fn assert_value(harness: &TestHarness, address: &str, expected: f64) {
    let actual = harness.value(address);
    assert!(
        (actual - expected).abs() < 1e-9,
        "Cell {} expected {}, got {}",
        address,
        expected,
        actual
    );
}

/// Assert that `first` was evaluated strictly before `second`.
pub fn assert_evaluated_before(report: &RecalcReport, first: &str, second: &str) {
    let position = |address: &str| {
        report
            .evaluated
            .iter()
            .position(|c| *c == at(address))
            .unwrap_or_else(|| panic!("{} was not evaluated: {:?}", address, report.evaluated))
    };
    assert!(
        position(first) < position(second),
        "{} should be evaluated before {}: {:?}",
        first,
        second,
        report.evaluated
    );
}

/// Assert that the report evaluated exactly `expected`, each once, in any order.
pub fn assert_evaluated_set(report: &RecalcReport, expected: &[&str]) {
    let mut actual = report.evaluated.clone();
    actual.sort();
    let mut wanted: Vec<CellCoordinate> = expected.iter().map(|a| at(a)).collect();
    wanted.sort();
    assert_eq!(actual, wanted, "evaluated set mismatch");
}
