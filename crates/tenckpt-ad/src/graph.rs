//! Tape-based reverse-mode automatic differentiation with checkpointing.
//!
//! A [`Tape`] records tensor operations as they execute. Each recorded node is
//! one of:
//!
//! - a **leaf**: a user-supplied variable or constant, or any value computed while
//!   recording is off or without a gradient-requiring input
//! - a **recorded** operation ([`Tape::apply`]): inputs are saved so the backward
//!   pass can run without touching the rest of the tape
//! - a **checkpointed** operation ([`Tape::checkpoint`]): nothing is saved. Once a
//!   later checkpointed operation consumes the node's value, the value is
//!   released and recomputed from its own inputs when it is needed again.
//!
//! Node ids increase monotonically and parents always precede their children, so
//! the backward pass walks ids in decreasing order without an explicit
//! topological sort.
//!
//! # Example
//!
//! ```rust
//! use tenckpt_ad::checkpoint::{ConjOp, ModeDotOp, TransposeOp};
//! use tenckpt_ad::graph::Tape;
//! use tenckpt_core::DenseND;
//!
//! # fn main() -> anyhow::Result<()> {
//! let tape = Tape::<f64>::new();
//!
//! let x = tape.variable(DenseND::ones(&[3, 4]), true);
//! let m = tape.variable(DenseND::from_elem(&[3, 2], 0.5), true);
//!
//! let mt = tape.checkpoint(TransposeOp, &[m])?;
//! let mh = tape.checkpoint(ConjOp, &[mt])?;
//! let y = tape.checkpoint(ModeDotOp::new(0), &[x, mh])?;
//!
//! // The intermediates were consumed and released
//! assert!(!tape.is_materialized(&mt));
//! assert!(!tape.is_materialized(&mh));
//!
//! tape.backward(&y)?;
//! assert_eq!(tape.gradient(&m)?.shape(), &[3, 2]);
//! # Ok(())
//! # }
//! ```

use crate::checkpoint::{CheckpointConfig, MemoryStats, SavePolicy, TensorOp};
use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tenckpt_core::{DenseND, Scalar};

/// Unique identifier for a node on a tape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Handle to a value recorded on a [`Tape`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable {
    id: NodeId,
}

impl Variable {
    fn new(id: NodeId) -> Self {
        Self { id }
    }

    /// Get the node ID
    pub fn id(&self) -> NodeId {
        self.id
    }
}

#[derive(Clone)]
enum NodeKind<T: Scalar> {
    Leaf,
    Recorded {
        op: Arc<dyn TensorOp<T>>,
        saved: Vec<Arc<ArrayD<T>>>,
    },
    Checkpointed {
        op: Arc<dyn TensorOp<T>>,
    },
}

impl<T: Scalar> NodeKind<T> {
    fn label(&self) -> &'static str {
        match self {
            NodeKind::Leaf => "leaf",
            NodeKind::Recorded { op, .. } | NodeKind::Checkpointed { op } => op.name(),
        }
    }
}

struct TapeNode<T: Scalar> {
    kind: NodeKind<T>,
    parents: Vec<NodeId>,
    /// Resident value; `None` once released
    value: Option<Arc<ArrayD<T>>>,
    shape: Vec<usize>,
    gradient: Option<ArrayD<T>>,
    requires_grad: bool,
    /// Sum of element moduli of the forward result, kept for verification
    fingerprint: Option<f64>,
}

struct TapeState<T: Scalar> {
    nodes: Vec<TapeNode<T>>,
    recording: bool,
}

/// Recording tape for reverse-mode differentiation
///
/// All methods take `&self`; the node table sits behind a mutex, so a tape can be
/// shared between threads.
pub struct Tape<T: Scalar> {
    state: Mutex<TapeState<T>>,
    config: CheckpointConfig,
}

impl<T: Scalar> Default for Tape<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> fmt::Debug for Tape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Tape")
            .field("nodes", &state.nodes.len())
            .field("recording", &state.recording)
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Scalar> Tape<T> {
    /// Create a tape with the default configuration (recompute checkpoints)
    pub fn new() -> Self {
        Self::with_config(CheckpointConfig::default())
    }

    /// Create a tape with an explicit checkpointing configuration
    pub fn with_config(config: CheckpointConfig) -> Self {
        Self {
            state: Mutex::new(TapeState {
                nodes: Vec::new(),
                recording: true,
            }),
            config,
        }
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Enable gradient recording (training mode)
    pub fn train(&self) {
        self.state.lock().recording = true;
    }

    /// Disable gradient recording (inference mode)
    pub fn eval(&self) {
        self.state.lock().recording = false;
    }

    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        self.state.lock().recording
    }

    /// Remove every node. Existing variables become invalid.
    pub fn clear(&self) {
        self.state.lock().nodes.clear();
    }

    /// Number of recorded nodes
    pub fn len(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a variable (input node)
    pub fn variable(&self, value: DenseND<T>, requires_grad: bool) -> Variable {
        let value = value.into_array();
        let mut state = self.state.lock();
        let id = NodeId(state.nodes.len());
        state.nodes.push(TapeNode {
            kind: NodeKind::Leaf,
            parents: Vec::new(),
            shape: value.shape().to_vec(),
            value: Some(Arc::new(value)),
            gradient: None,
            requires_grad,
            fingerprint: None,
        });
        Variable::new(id)
    }

    /// Create a constant (non-differentiable input)
    pub fn constant(&self, value: DenseND<T>) -> Variable {
        self.variable(value, false)
    }

    /// Run `op` and record it with its inputs saved for backward
    pub fn apply<O>(&self, op: O, inputs: &[Variable]) -> Result<Variable>
    where
        O: TensorOp<T> + 'static,
    {
        self.record(Arc::new(op), inputs, false)
    }

    /// Run `op` now and record it as a checkpoint
    ///
    /// Under [`SavePolicy::Recompute`] nothing is saved for backward, and every
    /// input that is itself a checkpoint is released: its value is dropped and
    /// recomputed from its own inputs whenever it is needed again. Under
    /// [`SavePolicy::Store`] this behaves like [`Tape::apply`].
    pub fn checkpoint<O>(&self, op: O, inputs: &[Variable]) -> Result<Variable>
    where
        O: TensorOp<T> + 'static,
    {
        self.record(Arc::new(op), inputs, true)
    }

    fn record(
        &self,
        op: Arc<dyn TensorOp<T>>,
        inputs: &[Variable],
        checkpointed: bool,
    ) -> Result<Variable> {
        if inputs.len() != op.arity() {
            return Err(anyhow!(
                "{} expects {} input(s), got {}",
                op.name(),
                op.arity(),
                inputs.len()
            ));
        }

        let mut state = self.state.lock();

        let mut cache = HashMap::new();
        let values = inputs
            .iter()
            .map(|v| materialize(&state.nodes, v.id, &mut cache, &self.config))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<_> = values.iter().map(|v| v.view()).collect();
        let output = op
            .forward(&views)
            .with_context(|| format!("{} forward failed", op.name()))?;

        let requires_grad = state.recording
            && inputs
                .iter()
                .any(|v| state.nodes.get(v.id.0).is_some_and(|n| n.requires_grad));
        let recompute =
            requires_grad && checkpointed && self.config.policy == SavePolicy::Recompute;

        let fingerprint = (recompute && self.config.verify_recomputation)
            .then(|| fingerprint(&output));

        let parents: Vec<NodeId> = inputs.iter().map(|v| v.id).collect();
        let kind = if !requires_grad {
            NodeKind::Leaf
        } else if recompute {
            NodeKind::Checkpointed {
                op: Arc::clone(&op),
            }
        } else {
            NodeKind::Recorded {
                op: Arc::clone(&op),
                saved: values.clone(),
            }
        };

        if recompute {
            for &parent_id in &parents {
                let parent = &mut state.nodes[parent_id.0];
                if matches!(parent.kind, NodeKind::Checkpointed { .. }) && parent.value.is_some() {
                    parent.value = None;
                    tracing::trace!(node = %parent_id, op = parent.kind.label(), "released activation");
                }
            }
        }

        let id = NodeId(state.nodes.len());
        tracing::trace!(
            node = %id,
            op = op.name(),
            checkpointed = recompute,
            shape = ?output.shape(),
            "recorded"
        );

        state.nodes.push(TapeNode {
            kind,
            parents,
            shape: output.shape().to_vec(),
            value: Some(Arc::new(output)),
            gradient: None,
            requires_grad,
            fingerprint,
        });

        Ok(Variable::new(id))
    }

    /// Get the value of a variable, recomputing it if it was released
    ///
    /// Recomputation does not make the value resident again.
    pub fn value(&self, var: &Variable) -> Result<DenseND<T>> {
        let state = self.state.lock();
        let mut cache = HashMap::new();
        let value = materialize(&state.nodes, var.id, &mut cache, &self.config)?;
        Ok(DenseND::from_array(Arc::unwrap_or_clone(value)))
    }

    /// Shape of a variable, available without recomputation
    pub fn shape(&self, var: &Variable) -> Result<Vec<usize>> {
        let state = self.state.lock();
        Ok(node(&state.nodes, var.id)?.shape.clone())
    }

    /// Number of modes of a variable
    pub fn ndim(&self, var: &Variable) -> Result<usize> {
        let state = self.state.lock();
        Ok(node(&state.nodes, var.id)?.shape.len())
    }

    /// Whether the variable's value is currently resident
    pub fn is_materialized(&self, var: &Variable) -> bool {
        let state = self.state.lock();
        state
            .nodes
            .get(var.id.0)
            .is_some_and(|node| node.value.is_some())
    }

    pub fn requires_grad(&self, var: &Variable) -> bool {
        let state = self.state.lock();
        state
            .nodes
            .get(var.id.0)
            .is_some_and(|node| node.requires_grad)
    }

    /// Get the gradient of a variable
    pub fn gradient(&self, var: &Variable) -> Result<DenseND<T>> {
        let state = self.state.lock();
        node(&state.nodes, var.id)?
            .gradient
            .clone()
            .map(DenseND::from_array)
            .ok_or_else(|| anyhow!("No gradient available for {}", var.id))
    }

    /// Check if a variable has a gradient
    pub fn has_gradient(&self, var: &Variable) -> bool {
        let state = self.state.lock();
        state
            .nodes
            .get(var.id.0)
            .is_some_and(|node| node.gradient.is_some())
    }

    /// Zero all gradients on the tape
    pub fn zero_grad(&self) {
        let mut state = self.state.lock();
        for node in state.nodes.iter_mut() {
            node.gradient = None;
        }
    }

    /// Memory currently held by the tape
    pub fn memory_stats(&self) -> MemoryStats {
        let state = self.state.lock();
        let elem = std::mem::size_of::<T>();
        let mut stats = MemoryStats {
            num_nodes: state.nodes.len(),
            ..Default::default()
        };

        let mut seen: HashSet<*const ArrayD<T>> = HashSet::new();
        for node in &state.nodes {
            let bytes = node.shape.iter().product::<usize>() * elem;
            match &node.value {
                Some(value) => {
                    seen.insert(Arc::as_ptr(value));
                    stats.retained_bytes += bytes;
                }
                None => {
                    stats.released_nodes += 1;
                    stats.released_bytes += bytes;
                }
            }
        }

        for node in &state.nodes {
            if let NodeKind::Recorded { saved, .. } = &node.kind {
                for value in saved {
                    if seen.insert(Arc::as_ptr(value)) {
                        stats.saved_bytes += value.len() * elem;
                    }
                }
            }
        }

        stats
    }

    /// Backward pass from `output`, seeded with ones
    ///
    /// For a scalar output this is the gradient of the output itself; otherwise
    /// it is the gradient of the sum of its elements.
    pub fn backward(&self, output: &Variable) -> Result<()> {
        let shape = self.shape(output)?;
        let seed = ArrayD::from_elem(IxDyn(&shape), T::one());
        self.backward_with(output, &DenseND::from_array(seed))
    }

    /// Backward pass from `output` with an explicit output cotangent
    ///
    /// Gradients accumulate into every gradient-requiring node reachable from
    /// `output`. Released values are recomputed into a transient cache, and each
    /// cache entry is dropped as soon as all of its consumers have been
    /// differentiated.
    pub fn backward_with(&self, output: &Variable, seed: &DenseND<T>) -> Result<()> {
        let mut state = self.state.lock();
        let nodes = &mut state.nodes;

        let output_node = node(nodes, output.id)?;
        if !output_node.requires_grad {
            return Err(anyhow!("{} does not require gradients", output.id));
        }
        if output_node.shape.as_slice() != seed.shape() {
            return Err(anyhow!(
                "Seed shape {:?} doesn't match output shape {:?}",
                seed.shape(),
                output_node.shape
            ));
        }

        // Ancestors of the output that take part in the backward pass
        let mut reachable = vec![false; output.id.0 + 1];
        reachable[output.id.0] = true;
        for idx in (0..=output.id.0).rev() {
            if reachable[idx] && nodes[idx].requires_grad {
                for parent in &nodes[idx].parents {
                    reachable[parent.0] = true;
                }
            }
        }

        // How many checkpointed consumers still need each value
        let mut pending: HashMap<NodeId, usize> = HashMap::new();
        for idx in 0..=output.id.0 {
            let node = &nodes[idx];
            if reachable[idx] && node.requires_grad {
                if let NodeKind::Checkpointed { .. } = node.kind {
                    for &parent in &node.parents {
                        *pending.entry(parent).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut cotangents: HashMap<NodeId, ArrayD<T>> = HashMap::new();
        cotangents.insert(output.id, seed.as_array().clone());
        let mut cache: HashMap<NodeId, Arc<ArrayD<T>>> = HashMap::new();
        let mut recomputed = 0usize;

        for idx in (0..=output.id.0).rev() {
            let id = NodeId(idx);
            let Some(grad) = cotangents.remove(&id) else {
                continue;
            };

            let (kind, parents) = {
                let node = &mut nodes[idx];
                match &mut node.gradient {
                    Some(current) => *current = &*current + &grad,
                    None => node.gradient = Some(grad.clone()),
                }
                (node.kind.clone(), node.parents.clone())
            };

            let parent_grads = match kind {
                NodeKind::Leaf => continue,
                NodeKind::Recorded { op, saved } => {
                    let views: Vec<_> = saved.iter().map(|v| v.view()).collect();
                    op.backward(&views, &grad.view())
                        .with_context(|| format!("{} backward failed at {}", op.name(), id))?
                }
                NodeKind::Checkpointed { op } => {
                    let before = cache.len();
                    let inputs = parents
                        .iter()
                        .map(|&p| materialize(nodes, p, &mut cache, &self.config))
                        .collect::<Result<Vec<_>>>()?;
                    recomputed += cache.len().saturating_sub(before);

                    let views: Vec<_> = inputs.iter().map(|v| v.view()).collect();
                    let grads = op
                        .backward(&views, &grad.view())
                        .with_context(|| format!("{} backward failed at {}", op.name(), id))?;

                    for parent in &parents {
                        if let Some(count) = pending.get_mut(parent) {
                            *count -= 1;
                            if *count == 0 && cache.remove(parent).is_some() {
                                tracing::trace!(node = %parent, "evicted recomputed activation");
                            }
                        }
                    }
                    grads
                }
            };

            if parent_grads.len() != parents.len() {
                return Err(anyhow!(
                    "{} backward returned {} gradient(s) for {} input(s)",
                    nodes[idx].kind.label(),
                    parent_grads.len(),
                    parents.len()
                ));
            }

            for (parent, parent_grad) in parents.into_iter().zip(parent_grads) {
                let parent_node = &nodes[parent.0];
                if !parent_node.requires_grad {
                    continue;
                }
                if parent_grad.shape() != parent_node.shape.as_slice() {
                    return Err(anyhow!(
                        "Gradient shape {:?} doesn't match shape {:?} of {}",
                        parent_grad.shape(),
                        parent_node.shape,
                        parent
                    ));
                }
                match cotangents.entry(parent) {
                    Entry::Occupied(mut entry) => {
                        let current = entry.get_mut();
                        *current = &*current + &parent_grad;
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(parent_grad);
                    }
                }
            }
        }

        tracing::debug!(
            output = %output.id,
            recomputed,
            "backward pass finished"
        );

        Ok(())
    }
}

fn node<T: Scalar>(nodes: &[TapeNode<T>], id: NodeId) -> Result<&TapeNode<T>> {
    nodes
        .get(id.0)
        .ok_or_else(|| anyhow!("{} not found on tape", id))
}

fn fingerprint<T: Scalar>(value: &ArrayD<T>) -> f64 {
    value.iter().map(|x| x.modulus()).sum()
}

/// Return the value of `id`, recomputing released ancestors through `cache`
fn materialize<T: Scalar>(
    nodes: &[TapeNode<T>],
    id: NodeId,
    cache: &mut HashMap<NodeId, Arc<ArrayD<T>>>,
    config: &CheckpointConfig,
) -> Result<Arc<ArrayD<T>>> {
    let node = node(nodes, id)?;
    if let Some(value) = &node.value {
        return Ok(Arc::clone(value));
    }
    if let Some(value) = cache.get(&id) {
        return Ok(Arc::clone(value));
    }

    let op = match &node.kind {
        NodeKind::Checkpointed { op } => Arc::clone(op),
        _ => return Err(anyhow!("Value of {} has been released and cannot be recomputed", id)),
    };

    let inputs = node
        .parents
        .iter()
        .map(|&parent| materialize(nodes, parent, cache, config))
        .collect::<Result<Vec<_>>>()?;
    let views: Vec<_> = inputs.iter().map(|v| v.view()).collect();
    let value = op
        .forward(&views)
        .with_context(|| format!("{} recomputation failed at {}", op.name(), id))?;

    if let Some(expected) = node.fingerprint {
        let actual = fingerprint(&value);
        let tolerance = config.verification_tolerance * expected.abs().max(1.0);
        let diff = (actual - expected).abs();
        // NaN anywhere in the recomputed value counts as divergence
        if diff.is_nan() || diff > tolerance {
            return Err(anyhow!(
                "Recomputed value of {} ({}) diverged from the forward pass: fingerprint {} vs {}",
                id,
                op.name(),
                actual,
                expected
            ));
        }
    }

    tracing::trace!(node = %id, op = op.name(), "recomputed activation");

    let value = Arc::new(value);
    cache.insert(id, Arc::clone(&value));
    Ok(value)
}
