//! Dependency graph of deployable units and the finalized deployment plan.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A constructor argument for a deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructorArg {
    /// A literal value passed through to the chain collaborator as-is.
    Literal(String),
    /// The deployed address of another unit, resolved at deploy time.
    AddressOf(String),
}

impl ConstructorArg {
    /// Parse the manifest shorthand: `@name` references another unit's
    /// address, anything else is a literal.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('@') {
            Some(name) => ConstructorArg::AddressOf(name.to_string()),
            None => ConstructorArg::Literal(raw.to_string()),
        }
    }
}

/// One deployable contract instance, identified by a logical name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployUnit {
    /// Logical unit name, unique within a graph.
    pub name: String,
    /// Bytecode reference handed to the chain-deployment collaborator.
    pub artifact: String,
    /// Ordered constructor arguments.
    pub constructor_args: Vec<ConstructorArg>,
    /// Names of units that must be deployed before this one.
    pub depends_on: BTreeSet<String>,
}

/// A post-deployment call registering `subject`'s address with `target`.
///
/// Executed once both endpoints are deployed: `target.method(subject.address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringAction {
    pub subject: String,
    pub target: String,
    pub method: String,
}

/// Errors raised while constructing or finalizing a [`DependencyGraph`].
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("unit '{0}' is already registered")]
    DuplicateUnit(String),
    #[error("unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency { unit: String, dependency: String },
    #[error("wiring action references unknown unit '{0}'")]
    UnknownUnit(String),
    #[error("dependency cycle: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
}

/// Mutable registry of units and wiring actions.
///
/// Construction-time checks catch duplicate unit names and wiring endpoints
/// that were never registered; everything dependency-shaped is validated in
/// [`DependencyGraph::finalize`], which either rejects the graph or produces
/// an immutable [`DeploymentPlan`].
#[derive(Debug, Default)]
pub struct DependencyGraph {
    units: Vec<DeployUnit>,
    index: HashMap<String, usize>,
    wiring: Vec<WiringAction>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deployable unit.
    pub fn add_unit(
        &mut self,
        name: impl Into<String>,
        artifact: impl Into<String>,
        constructor_args: Vec<ConstructorArg>,
        depends_on: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), GraphError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(GraphError::DuplicateUnit(name));
        }
        self.index.insert(name.clone(), self.units.len());
        self.units.push(DeployUnit {
            name,
            artifact: artifact.into(),
            constructor_args,
            depends_on: depends_on.into_iter().map(Into::into).collect(),
        });
        Ok(())
    }

    /// Register a wiring action between two already-registered units.
    pub fn add_wiring(
        &mut self,
        subject: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
    ) -> Result<(), GraphError> {
        let subject = subject.into();
        let target = target.into();
        for endpoint in [&subject, &target] {
            if !self.index.contains_key(endpoint.as_str()) {
                return Err(GraphError::UnknownUnit(endpoint.clone()));
            }
        }
        self.wiring.push(WiringAction {
            subject,
            target,
            method: method.into(),
        });
        Ok(())
    }

    /// Validate the graph and produce the deployment plan.
    ///
    /// Address references in constructor arguments are unioned into each
    /// unit's dependency set, so the topological guarantee also covers
    /// argument resolution. Ties are broken by declaration order, making the
    /// plan reproducible across runs.
    pub fn finalize(mut self) -> Result<DeploymentPlan, GraphError> {
        // Fold `@` constructor references into the declared dependencies.
        for unit in &mut self.units {
            for arg in &unit.constructor_args {
                if let ConstructorArg::AddressOf(dep) = arg {
                    unit.depends_on.insert(dep.clone());
                }
            }
        }

        for unit in &self.units {
            for dep in &unit.depends_on {
                if !self.index.contains_key(dep.as_str()) {
                    return Err(GraphError::UnknownDependency {
                        unit: unit.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let order = self.topological_order()?;
        let units = order
            .into_iter()
            .map(|idx| self.units[idx].clone())
            .collect();

        Ok(DeploymentPlan {
            units,
            wiring: self.wiring,
        })
    }

    /// Kahn's algorithm over declaration indices. The ready set is ordered,
    /// so among units whose dependencies are all satisfied the earliest
    /// declared one is scheduled first.
    fn topological_order(&self) -> Result<Vec<usize>, GraphError> {
        let mut in_degree = vec![0usize; self.units.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.units.len()];
        for (idx, unit) in self.units.iter().enumerate() {
            for dep in &unit.depends_on {
                in_degree[idx] += 1;
                dependents[self.index[dep.as_str()]].push(idx);
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(idx, _)| idx)
            .collect();
        let mut order = Vec::with_capacity(self.units.len());

        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            for &child in &dependents[idx] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.insert(child);
                }
            }
        }

        if order.len() != self.units.len() {
            let stuck: Vec<usize> = in_degree
                .iter()
                .enumerate()
                .filter(|(_, d)| **d > 0)
                .map(|(idx, _)| idx)
                .collect();
            return Err(GraphError::CyclicDependency(self.extract_cycle(&stuck)));
        }
        Ok(order)
    }

    /// Walk dependency edges among the stuck units until one repeats.
    fn extract_cycle(&self, stuck: &[usize]) -> Vec<String> {
        let stuck_set: BTreeSet<usize> = stuck.iter().copied().collect();
        let mut path: Vec<usize> = Vec::new();
        let mut current = stuck[0];
        loop {
            if let Some(pos) = path.iter().position(|&idx| idx == current) {
                return path[pos..]
                    .iter()
                    .map(|&idx| self.units[idx].name.clone())
                    .collect();
            }
            path.push(current);
            current = self.units[current]
                .depends_on
                .iter()
                .filter_map(|dep| self.index.get(dep.as_str()).copied())
                .find(|idx| stuck_set.contains(idx))
                .expect("stuck unit has a stuck dependency");
        }
    }
}

/// The immutable, dependency-respecting order in which units are deployed
/// within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentPlan {
    units: Vec<DeployUnit>,
    wiring: Vec<WiringAction>,
}

impl DeploymentPlan {
    /// Units in deployment order.
    pub fn units(&self) -> &[DeployUnit] {
        &self.units
    }

    /// All wiring actions declared for this suite.
    pub fn wiring(&self) -> &[WiringAction] {
        &self.wiring
    }
}
