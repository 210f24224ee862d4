//! The layered network abstraction.
//!
//! A [`Network`] owns an ordered sequence of [`Layer`]s and one shared
//! [`NeuronModel`].  Evaluation is interceptable: per stage, registered
//! pre-hooks fire on the stage input, the raw synaptic op runs, post-hooks
//! fire on the raw output, and finally the spiking response is applied
//! (dropout stages skip the response).  The fault-injection engine builds
//! its entire perturb/restore machinery on these hooks.
//!
//! `forward_range` evaluates an inclusive sub-range of stages as a
//! first-class operation; the campaign uses it to seed a faulty suffix from
//! a cached golden activation and to probe single stages for reconvergence.

use crate::error::NetError;
use crate::layer::{Layer, LayerKind};
use crate::neuron::NeuronModel;
use crate::Tensor;

/// A hook callback: receives the stage and the tensor it may mutate
/// (the stage input for pre-hooks, the raw output for post-hooks).
pub type Hook = Box<dyn FnMut(&mut Layer, &mut Tensor)>;

/// Which side of a stage a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Fires on the stage's input, before the raw op.
    Pre,
    /// Fires on the stage's raw output, before the spiking response.
    Post,
}

/// Removable registration token for an installed hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookHandle {
    stage: usize,
    kind: HookKind,
    id: u64,
}

struct HookEntry {
    id: u64,
    hook: Hook,
}

/// An ordered, hook-interceptable, layered spiking network.
pub struct Network {
    layers: Vec<Layer>,
    neuron: NeuronModel,
    pre_hooks: Vec<Vec<HookEntry>>,
    post_hooks: Vec<Vec<HookEntry>>,
    next_hook_id: u64,
}

impl Network {
    /// Create a network from ordered stages and a shared neuron model.
    pub fn new(layers: Vec<Layer>, neuron: NeuronModel) -> Self {
        let n = layers.len();
        Self {
            layers,
            neuron,
            pre_hooks: (0..n).map(|_| Vec::new()).collect(),
            post_hooks: (0..n).map(|_| Vec::new()).collect(),
            next_hook_id: 0,
        }
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the network has no stages.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The ordered stages.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable access to one stage.
    pub fn layer_mut(&mut self, stage: usize) -> Result<&mut Layer, NetError> {
        let len = self.layers.len();
        self.layers
            .get_mut(stage)
            .ok_or(NetError::StageIndex { index: stage, len })
    }

    /// The shared neuron model.
    pub fn neuron(&self) -> &NeuronModel {
        &self.neuron
    }

    /// Full structural clone with independent weight storage.
    ///
    /// Hook registrations are deliberately not carried over: the clone is
    /// the factory for a fresh faulty instance, and each campaign run
    /// installs its own hooks on it.
    pub fn clone_structure(&self) -> Self {
        Self::new(self.layers.clone(), self.neuron.clone())
    }

    /// Register a pre-hook on a stage; fires on the stage's input.
    pub fn register_pre_hook(&mut self, stage: usize, hook: Hook) -> Result<HookHandle, NetError> {
        self.register(stage, HookKind::Pre, hook)
    }

    /// Register a post-hook on a stage; fires on the stage's raw output.
    pub fn register_post_hook(&mut self, stage: usize, hook: Hook) -> Result<HookHandle, NetError> {
        self.register(stage, HookKind::Post, hook)
    }

    fn register(
        &mut self,
        stage: usize,
        kind: HookKind,
        hook: Hook,
    ) -> Result<HookHandle, NetError> {
        if stage >= self.layers.len() {
            return Err(NetError::StageIndex {
                index: stage,
                len: self.layers.len(),
            });
        }
        let id = self.next_hook_id;
        self.next_hook_id += 1;
        let entry = HookEntry { id, hook };
        match kind {
            HookKind::Pre => self.pre_hooks[stage].push(entry),
            HookKind::Post => self.post_hooks[stage].push(entry),
        }
        Ok(HookHandle { stage, kind, id })
    }

    /// Remove one previously registered hook.  Removing a hook twice is a
    /// no-op.
    pub fn remove_hook(&mut self, handle: HookHandle) {
        let slot = match handle.kind {
            HookKind::Pre => &mut self.pre_hooks[handle.stage],
            HookKind::Post => &mut self.post_hooks[handle.stage],
        };
        slot.retain(|e| e.id != handle.id);
    }

    /// Remove every registered hook.
    pub fn clear_hooks(&mut self) {
        for slot in self.pre_hooks.iter_mut().chain(self.post_hooks.iter_mut()) {
            slot.clear();
        }
    }

    /// Evaluate all stages.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor, NetError> {
        if self.layers.is_empty() {
            return Err(NetError::EmptyNetwork);
        }
        let end = self.layers.len() - 1;
        self.forward_range(input, 0, end)
    }

    /// Evaluate the inclusive stage sub-range `[start, end]`.
    ///
    /// `start > end` returns the input unchanged; this mirrors an empty
    /// sub-range and is relied on by the campaign's early-stop arithmetic.
    pub fn forward_range(
        &mut self,
        input: &Tensor,
        start: usize,
        end: usize,
    ) -> Result<Tensor, NetError> {
        if start > end {
            return Ok(input.clone());
        }
        if end >= self.layers.len() {
            return Err(NetError::StageIndex {
                index: end,
                len: self.layers.len(),
            });
        }

        let mut spikes = input.clone();
        for idx in start..=end {
            let layer = &mut self.layers[idx];
            for entry in &mut self.pre_hooks[idx] {
                (entry.hook)(layer, &mut spikes);
            }

            let mut raw = layer.apply(&spikes)?;
            for entry in &mut self.post_hooks[idx] {
                (entry.hook)(layer, &mut raw);
            }

            spikes = if layer.kind == LayerKind::Dropout {
                raw
            } else {
                self.neuron.respond(&raw)
            };
        }
        Ok(spikes)
    }
}
