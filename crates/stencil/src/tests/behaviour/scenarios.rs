//! Scenario bindings for the `stencil` BDD feature file.
//!
//! These functions bind Gherkin scenario names to the step definitions in the
//! parent module.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::scenario;

use super::TestWorld;

/// Fixture providing the shared BDD world.
#[fixture]
fn world() -> RefCell<TestWorld> {
    super::world()
}

#[scenario(
    path = "tests/features/stencil.feature",
    name = "Repeated variables require equal subtrees"
)]
fn repeated_variables(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/stencil.feature",
    name = "Quantified statements split a block"
)]
fn quantified_statements(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/stencil.feature",
    name = "Constraints filter candidate bindings"
)]
fn constraints_filter(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/stencil.feature",
    name = "Comment patterns match comment bodies"
)]
fn comment_patterns(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/stencil.feature",
    name = "Pattern with no matches returns empty"
)]
fn pattern_no_matches(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/stencil.feature",
    name = "Rewrite collapses duplicated statements"
)]
fn rewrite_collapses_duplicates(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/stencil.feature",
    name = "Rewrite drops the separator of an empty run"
)]
fn rewrite_drops_separator(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/stencil.feature",
    name = "Rewrite with no matches leaves code unchanged"
)]
fn rewrite_no_changes(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/stencil.feature",
    name = "Replacement naming an unknown variable is rejected"
)]
fn replacement_unknown_variable(world: RefCell<TestWorld>) {
    drop(world);
}
