//! Per-group accumulation shared by the aggregate operator and the
//! coordinator's result merge.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use distq_core::prelude::{DataType, Scalar, Schema, Tuple};

use super::accumulator::{Accumulator, AggregateMode, AggregateSpec};
use crate::traits::{OpError, Result};

/// Hashable group key. `None` is the single sentinel group of an ungrouped
/// aggregate. Floats compare bitwise so that equal keys hash equally.
#[derive(Debug, Clone)]
pub struct GroupKey(pub Option<Scalar>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(Scalar::Int(a)), Some(Scalar::Int(b))) => a == b,
            (Some(Scalar::Float(a)), Some(Scalar::Float(b))) => a.to_bits() == b.to_bits(),
            (Some(Scalar::Text(a)), Some(Scalar::Text(b))) => a == b,
            _ => false,
        }
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            None => 0u8.hash(state),
            Some(Scalar::Int(i)) => {
                1u8.hash(state);
                i.hash(state);
            }
            Some(Scalar::Float(f)) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            Some(Scalar::Text(s)) => {
                3u8.hash(state);
                s.hash(state);
            }
        }
    }
}

/// One accumulator per distinct group key, reported in first-seen order.
///
/// Filled by `merge_tuple` (raw rows) or `merge_partial` (rows in the
/// partial layout of the same spec), then `freeze`d. A frozen aggregator
/// rejects updates until `reset`.
#[derive(Debug, Clone)]
pub struct GroupedAggregator {
    spec: AggregateSpec,
    input_type: DataType,
    index: HashMap<GroupKey, usize>,
    groups: Vec<(GroupKey, Accumulator)>,
    frozen: bool,
}

impl GroupedAggregator {
    pub fn new(spec: AggregateSpec, input: &Schema) -> Result<Self> {
        let input_type = spec.input_type(input)?;
        Ok(Self {
            spec,
            input_type,
            index: HashMap::new(),
            groups: Vec::new(),
            frozen: false,
        })
    }

    pub fn spec(&self) -> &AggregateSpec {
        &self.spec
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Fold one input row of the aggregated relation.
    pub fn merge_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let key = match self.spec.group_field {
            Some(g) => GroupKey(Some(tuple.get(g)?.clone())),
            None => GroupKey(None),
        };
        let value = tuple.get(self.spec.agg_field)?;
        self.group_mut(key)?.update(value)
    }

    /// Fold one row produced by a `Partial` aggregate with the same spec:
    /// `[group?, state...]`.
    pub fn merge_partial(&mut self, tuple: &Tuple) -> Result<()> {
        let (key, state) = match self.spec.group_field {
            Some(_) => {
                let (g, rest) = tuple
                    .values
                    .split_first()
                    .ok_or_else(|| OpError::Exec("partial aggregate row is empty".into()))?;
                (GroupKey(Some(g.clone())), rest)
            }
            None => (GroupKey(None), tuple.values.as_slice()),
        };
        self.group_mut(key)?.merge(state)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Drop every group and accept updates again.
    pub fn reset(&mut self) {
        self.index.clear();
        self.groups.clear();
        self.frozen = false;
    }

    /// One row per group in insertion order.
    pub fn results(&self, mode: AggregateMode) -> Result<Vec<Tuple>> {
        self.groups
            .iter()
            .map(|(key, acc)| {
                let mut values = Vec::with_capacity(3);
                if let Some(k) = &key.0 {
                    values.push(k.clone());
                }
                match mode {
                    AggregateMode::Complete => values.push(acc.finalize()?),
                    AggregateMode::Partial => values.extend(acc.partial_values()?),
                }
                Ok(Tuple::new(values))
            })
            .collect()
    }

    fn group_mut(&mut self, key: GroupKey) -> Result<&mut Accumulator> {
        if self.frozen {
            return Err(OpError::InvalidState(
                "aggregate state is frozen until rewind".into(),
            ));
        }
        let slot = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.groups.len();
                self.index.insert(key.clone(), i);
                self.groups
                    .push((key, Accumulator::new(self.spec.func, self.input_type)));
                i
            }
        };
        Ok(&mut self.groups[slot].1)
    }
}
