use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};

use crate::error::{OptErr, Result};

/// A named collection of flat `f32` buffers.
///
/// Parameters, gradients, updates and optimizer accumulators are all `ParamTree`s.
/// Two trees are structurally compatible when they hold the same leaf names and every
/// leaf has the same length, elementwise operations require compatibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamTree(BTreeMap<String, Vec<f32>>);

impl ParamTree {
    /// Creates a new empty `ParamTree`.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a leaf, replacing any previous leaf with the same name.
    ///
    /// # Arguments
    /// * `name` - The name of the leaf.
    /// * `values` - The flat values of the leaf.
    ///
    /// # Returns
    /// The replaced leaf, if any.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f32>) -> Option<Vec<f32>> {
        self.0.insert(name.into(), values)
    }

    /// Builder flavoured `insert`.
    pub fn with_leaf(mut self, name: impl Into<String>, values: Vec<f32>) -> Self {
        self.insert(name, values);
        self
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Reads a single element leaf.
    ///
    /// # Arguments
    /// * `name` - The name of the leaf.
    ///
    /// # Returns
    /// The value or an error if the leaf is missing or doesn't hold exactly one value.
    pub fn scalar(&self, name: &str) -> Result<f32> {
        let leaf = self
            .get(name)
            .ok_or_else(|| OptErr::MissingLeaf(name.to_string()))?;

        match leaf {
            [value] => Ok(*value),
            _ => Err(OptErr::SizeMismatch {
                leaf: name.to_string(),
                got: leaf.len(),
                expected: 1,
            }),
        }
    }

    pub fn leaves(&self) -> btree_map::Iter<'_, String, Vec<f32>> {
        self.0.iter()
    }

    /// The amount of leaves.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The total amount of values across every leaf.
    pub fn num_params(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Checks that `other` has the same structure as `self`.
    ///
    /// # Arguments
    /// * `other` - The tree to compare against.
    ///
    /// # Returns
    /// A structural error naming the first offending leaf.
    pub fn check_compatible(&self, other: &ParamTree) -> Result<()> {
        for (name, values) in self.leaves() {
            let Some(other_values) = other.get(name) else {
                return Err(OptErr::StructureMismatch { leaf: name.clone() });
            };

            if other_values.len() != values.len() {
                return Err(OptErr::SizeMismatch {
                    leaf: name.clone(),
                    got: other_values.len(),
                    expected: values.len(),
                });
            }
        }

        if let Some(name) = other.0.keys().find(|name| !self.0.contains_key(*name)) {
            return Err(OptErr::StructureMismatch { leaf: name.clone() });
        }

        Ok(())
    }

    /// Applies `f` to every value, producing a tree of the same structure.
    pub fn map<F: FnMut(f32) -> f32>(&self, mut f: F) -> ParamTree {
        let leaves = self
            .leaves()
            .map(|(name, values)| (name.clone(), values.iter().map(|&v| f(v)).collect()))
            .collect();

        Self(leaves)
    }

    pub fn zeros_like(&self) -> ParamTree {
        self.full_like(0.)
    }

    pub fn full_like(&self, value: f32) -> ParamTree {
        self.map(|_| value)
    }

    /// Combines two compatible trees elementwise.
    ///
    /// # Arguments
    /// * `other` - The right hand side of `f`.
    /// * `f` - The elementwise function.
    ///
    /// # Returns
    /// The combined tree or a structural error.
    pub fn zip_map<F>(&self, other: &ParamTree, mut f: F) -> Result<ParamTree>
    where
        F: FnMut(f32, f32) -> f32,
    {
        self.check_compatible(other)?;

        let leaves = self
            .0
            .iter()
            .zip(other.0.values())
            .map(|((name, a), b)| {
                let values = a.iter().zip(b).map(|(&a, &b)| f(a, b)).collect();
                (name.clone(), values)
            })
            .collect();

        Ok(Self(leaves))
    }

    pub fn add(&self, other: &ParamTree) -> Result<ParamTree> {
        self.zip_map(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &ParamTree) -> Result<ParamTree> {
        self.zip_map(other, |a, b| a - b)
    }

    pub fn scale(&self, factor: f32) -> ParamTree {
        self.map(|v| v * factor)
    }

    /// The L2 norm over every value of the tree.
    pub fn global_norm(&self) -> f32 {
        self.0
            .values()
            .flatten()
            .map(|v| v * v)
            .sum::<f32>()
            .sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.0.values().flatten().all(|v| v.is_finite())
    }

    /// Computes the unweighted elementwise mean of a set of compatible trees.
    ///
    /// # Arguments
    /// * `trees` - The trees to average, there must be at least one.
    ///
    /// # Returns
    /// The mean tree, `EmptyMean` if `trees` is empty or a structural error.
    pub fn mean<'a, I>(trees: I) -> Result<ParamTree>
    where
        I: IntoIterator<Item = &'a ParamTree>,
    {
        let mut trees = trees.into_iter();
        let mut acc = trees.next().ok_or(OptErr::EmptyMean)?.clone();
        let mut count = 1usize;

        for tree in trees {
            acc = acc.add(tree)?;
            count += 1;
        }

        Ok(acc.scale(1. / count as f32))
    }
}

impl FromIterator<(String, Vec<f32>)> for ParamTree {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f32>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ParamTree {
    type Item = (&'a String, &'a Vec<f32>);
    type IntoIter = btree_map::Iter<'a, String, Vec<f32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.leaves()
    }
}
