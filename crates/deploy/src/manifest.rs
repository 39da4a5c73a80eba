//! Declarative contract-suite manifest.
//!
//! Replaces a hand-enumerated deployment script with `[[units]]` and
//! `[[wiring]]` tables. Constructor arguments use the `@name` shorthand to
//! reference another unit's deployed address.

use serde::{Deserialize, Serialize};

use crate::graph::{ConstructorArg, DependencyGraph, DeploymentPlan, GraphError};

/// One `[[units]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    /// Bytecode reference, resolved by the chain collaborator.
    pub artifact: String,
    /// Constructor arguments; `@name` references another unit's address.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Explicit dependencies beyond those implied by `@` arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// One `[[wiring]]` entry: `target.method(subject.address)` once both are
/// deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringSpec {
    pub subject: String,
    pub target: String,
    pub method: String,
}

/// The declared suite: units plus their post-deploy wiring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteManifest {
    #[serde(default)]
    pub units: Vec<UnitSpec>,
    #[serde(default)]
    pub wiring: Vec<WiringSpec>,
}

impl SuiteManifest {
    /// Build and finalize the dependency graph for this suite.
    ///
    /// All units are registered before any wiring, so wiring declarations
    /// may reference units in any order within the manifest.
    pub fn to_plan(&self) -> Result<DeploymentPlan, GraphError> {
        let mut graph = DependencyGraph::new();
        for unit in &self.units {
            let args = unit
                .args
                .iter()
                .map(|raw| ConstructorArg::parse(raw))
                .collect();
            graph.add_unit(
                unit.name.as_str(),
                unit.artifact.as_str(),
                args,
                unit.depends_on.iter().map(String::as_str),
            )?;
        }
        for wiring in &self.wiring {
            graph.add_wiring(
                wiring.subject.as_str(),
                wiring.target.as_str(),
                wiring.method.as_str(),
            )?;
        }
        graph.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[units]]
        name = "manager"
        artifact = "manager.bin"

        [[units]]
        name = "slots"
        artifact = "slots.bin"
        args = ["@manager"]

        [[units]]
        name = "roulette"
        artifact = "roulette.bin"
        args = ["@manager", "36"]

        [[wiring]]
        subject = "slots"
        target = "manager"
        method = "addFriend"

        [[wiring]]
        subject = "roulette"
        target = "manager"
        method = "addFriend"
    "#;

    #[test]
    fn manifest_parses_and_plans() {
        let manifest: SuiteManifest = toml::from_str(SAMPLE).unwrap();
        assert_eq!(manifest.units.len(), 3);
        assert_eq!(manifest.wiring.len(), 2);

        let plan = manifest.to_plan().unwrap();
        assert_eq!(plan.units()[0].name, "manager");
        assert_eq!(plan.wiring().len(), 2);
    }

    #[test]
    fn at_references_resolve_to_address_args() {
        let manifest: SuiteManifest = toml::from_str(SAMPLE).unwrap();
        let plan = manifest.to_plan().unwrap();

        let roulette = plan
            .units()
            .iter()
            .find(|u| u.name == "roulette")
            .unwrap();
        assert_eq!(
            roulette.constructor_args,
            vec![
                ConstructorArg::AddressOf("manager".to_string()),
                ConstructorArg::Literal("36".to_string()),
            ]
        );
        assert!(roulette.depends_on.contains("manager"));
    }

    #[test]
    fn wiring_before_units_in_file_still_resolves() {
        let raw = r#"
            [[wiring]]
            subject = "slots"
            target = "manager"
            method = "addFriend"

            [[units]]
            name = "manager"
            artifact = "manager.bin"

            [[units]]
            name = "slots"
            artifact = "slots.bin"
            args = ["@manager"]
        "#;
        let manifest: SuiteManifest = toml::from_str(raw).unwrap();
        assert!(manifest.to_plan().is_ok());
    }

    #[test]
    fn wiring_to_undeclared_unit_fails() {
        let raw = r#"
            [[units]]
            name = "manager"
            artifact = "manager.bin"

            [[wiring]]
            subject = "slots"
            target = "manager"
            method = "addFriend"
        "#;
        let manifest: SuiteManifest = toml::from_str(raw).unwrap();
        let err = manifest.to_plan().unwrap_err();
        assert!(matches!(err, GraphError::UnknownUnit(name) if name == "slots"));
    }
}
