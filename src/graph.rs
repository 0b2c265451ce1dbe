use std::collections::BTreeMap;
use tracing::debug;

use crate::{dependency::Dependency, errors::DependencyCycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Named nodes with declared dependencies, remembering insertion order.
///
/// Insertion order makes every sort deterministic: among nodes without mutual
/// constraints, the earlier-registered one comes first.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, Vec<Dependency>>,
    order: Vec<String>,
}

impl DependencyGraph {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node or replaces the dependencies of an existing one.
    /// Dependencies may name nodes that are not (yet) in the graph.
    pub fn add_node<I>(&mut self, name: impl Into<String>, dependencies: I)
    where
        I: IntoIterator,
        I::Item: Into<Dependency>,
    {
        let name = name.into();
        let dependencies = dependencies.into_iter().map(Into::into).collect();
        if self.nodes.insert(name.clone(), dependencies).is_none() {
            self.order.push(name);
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Declared dependencies of a node, an empty slice for unknown nodes
    #[inline]
    #[must_use]
    pub fn dependencies(&self, name: &str) -> &[Dependency] {
        self.nodes.get(name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn dependency_names(&self, name: &str) -> Vec<&str> {
        self.dependencies(name).iter().map(|dep| dep.name.as_str()).collect()
    }

    #[must_use]
    pub fn eager_dependencies(&self, name: &str) -> Vec<&str> {
        self.dependencies(name)
            .iter()
            .filter(|dep| !dep.is_lazy())
            .map(|dep| dep.name.as_str())
            .collect()
    }

    /// Node names in insertion order
    #[inline]
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Orders nodes so every node comes after all of its dependencies.
    /// Dependencies that aren't nodes are skipped.
    ///
    /// # Errors
    /// Returns [`DependencyCycle`] with the path of the first cycle found
    pub fn topological_sort(&self) -> Result<Vec<String>, DependencyCycle> {
        self.sort(|_| true)
    }

    /// Same as [`Self::topological_sort`], but lazy edges don't constrain the order
    /// and can't form cycles.
    ///
    /// # Errors
    /// Returns [`DependencyCycle`] with the path of the first eager cycle found
    pub fn topological_sort_eager_only(&self) -> Result<Vec<String>, DependencyCycle> {
        self.sort(|dep| !dep.is_lazy())
    }

    fn sort(&self, follow: impl Fn(&Dependency) -> bool + Copy) -> Result<Vec<String>, DependencyCycle> {
        let mut marks = BTreeMap::new();
        let mut path = Vec::new();
        let mut sorted = Vec::with_capacity(self.order.len());

        for name in &self.order {
            self.visit(name, follow, &mut marks, &mut path, &mut sorted)?;
        }

        debug!(?sorted, "Sorted");
        Ok(sorted)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        follow: impl Fn(&Dependency) -> bool + Copy,
        marks: &mut BTreeMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        sorted: &mut Vec<String>,
    ) -> Result<(), DependencyCycle> {
        match marks.get(name) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|entry| *entry == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|entry| (*entry).to_owned()).collect();
                cycle.push(name.to_owned());
                return Err(DependencyCycle { cycle });
            }
            None => {}
        }

        let Some(dependencies) = self.nodes.get(name) else {
            return Ok(());
        };

        marks.insert(name, Mark::Visiting);
        path.push(name);

        for dependency in dependencies.iter().filter(|dep| follow(dep)) {
            self.visit(&dependency.name, follow, marks, path, sorted)?;
        }

        path.pop();
        marks.insert(name, Mark::Visited);
        sorted.push(name.to_owned());

        Ok(())
    }
}
