//! Layer topology registry.
//!
//! A [`LayerTopology`] is a static description of a network's ordered
//! computation stages: per stage, the synaptic-weight shape, the neuronal
//! output shape, whether faults may be injected there, and which stage
//! follows it.  It is built once from a recorded reference pass and never
//! mutates for the lifetime of a campaign.

use crate::error::NetError;
use crate::layer::LayerKind;
use crate::network::Network;
use crate::Tensor;
use log::debug;
use ndarray::Array4;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Recorded metadata for a single stage.
#[derive(Debug, Clone)]
pub struct LayerInfo {
    /// Stage name.
    pub name: String,
    /// Stage type.
    pub kind: LayerKind,
    /// Synaptic weight tensor shape; all zeros for weightless stages.
    pub weight_shape: [usize; 4],
    /// Neuronal output shape `(channels, height, width)`, batch excluded.
    pub output_shape: [usize; 3],
    /// Whether faults may address this stage.
    pub injectable: bool,
}

/// Ordered registry of a network's stages and their shapes.
#[derive(Debug, Clone)]
pub struct LayerTopology {
    layers: Vec<LayerInfo>,
    index: HashMap<String, usize>,
}

impl LayerTopology {
    /// Build the registry by running one reference pass over the network
    /// with temporary recording hooks, one per stage.
    ///
    /// `shape_in` is the single-sample input shape `(channels, h, w)`.
    pub fn infer(net: &mut Network, shape_in: (usize, usize, usize)) -> Result<Self, NetError> {
        if net.is_empty() {
            return Err(NetError::EmptyNetwork);
        }

        let records: Rc<RefCell<Vec<LayerInfo>>> = Rc::new(RefCell::new(Vec::new()));
        let mut handles = Vec::with_capacity(net.len());
        for stage in 0..net.len() {
            let records = Rc::clone(&records);
            let handle = net.register_post_hook(
                stage,
                Box::new(move |layer, raw: &mut Tensor| {
                    let (_, c, h, w) = raw.dim();
                    records.borrow_mut().push(LayerInfo {
                        name: layer.name.clone(),
                        kind: layer.kind,
                        weight_shape: layer.weight_shape(),
                        output_shape: [c, h, w],
                        injectable: layer.is_injectable(),
                    });
                }),
            )?;
            handles.push(handle);
        }

        let dummy = Array4::from_elem((1, shape_in.0, shape_in.1, shape_in.2), 1.0);
        let result = net.forward(&dummy);
        for handle in handles {
            net.remove_hook(handle);
        }
        result?;

        let layers = Rc::try_unwrap(records)
            .map_err(|_| NetError::EmptyNetwork)?
            .into_inner();
        let index = layers
            .iter()
            .enumerate()
            .map(|(i, l)| (l.name.clone(), i))
            .collect();
        debug!(
            "Inferred topology of {} stages: {}",
            layers.len(),
            layers
                .iter()
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(Self { layers, index })
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Ordered stage names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    /// Ordered stage metadata.
    pub fn layers(&self) -> &[LayerInfo] {
        &self.layers
    }

    /// Topological index of a stage.  Unknown names indicate registry /
    /// campaign desynchronization and are a hard error.
    pub fn position(&self, name: &str) -> Result<usize, NetError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| NetError::UnknownLayer(name.to_string()))
    }

    /// Metadata for a stage by name.
    pub fn get(&self, name: &str) -> Result<&LayerInfo, NetError> {
        self.position(name).map(|i| &self.layers[i])
    }

    /// The relevant shape for a fault target: the 4-axis weight shape for
    /// synaptic faults, the 3-axis output shape otherwise.
    pub fn shape(&self, is_synaptic: bool, name: &str) -> Result<&[usize], NetError> {
        let info = self.get(name)?;
        Ok(if is_synaptic {
            &info.weight_shape
        } else {
            &info.output_shape
        })
    }

    /// Ordered names of the injectable stages.
    pub fn injectables(&self) -> Vec<&str> {
        self.layers
            .iter()
            .filter(|l| l.injectable)
            .map(|l| l.name.as_str())
            .collect()
    }

    /// Whether a stage accepts fault injection.  Unknown names are not
    /// injectable.
    pub fn is_injectable(&self, name: &str) -> bool {
        self.index
            .get(name)
            .map(|&i| self.layers[i].injectable)
            .unwrap_or(false)
    }

    /// Whether a stage is the final/output stage.
    pub fn is_output(&self, name: &str) -> bool {
        self.index
            .get(name)
            .map(|&i| i + 1 == self.layers.len())
            .unwrap_or(false)
    }

    /// Name of the output stage.
    pub fn output_name(&self) -> Option<&str> {
        self.layers.last().map(|l| l.name.as_str())
    }

    /// Name of the stage immediately after the given one, if any.
    pub fn following(&self, name: &str) -> Result<Option<&str>, NetError> {
        let idx = self.position(name)?;
        Ok(self.layers.get(idx + 1).map(|l| l.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::neuron::NeuronModel;

    fn net() -> Network {
        let conv = Layer::conv("sc1", Array4::from_elem((2, 1, 1, 1), 1.0));
        let drop = Layer::dropout("sd1");
        let dense = Layer::dense("sf1", Array4::from_elem((3, 2 * 2 * 2, 1, 1), 1.0));
        Network::new(vec![conv, drop, dense], NeuronModel::default())
    }

    #[test]
    fn infer_records_every_stage_in_order() {
        let mut net = net();
        let topo = LayerTopology::infer(&mut net, (1, 2, 2)).unwrap();
        assert_eq!(topo.len(), 3);
        let names: Vec<_> = topo.names().collect();
        assert_eq!(names, vec!["sc1", "sd1", "sf1"]);
    }

    #[test]
    fn infer_removes_its_recording_hooks() {
        let mut net = net();
        LayerTopology::infer(&mut net, (1, 2, 2)).unwrap();
        // A second inference must see exactly one record per stage again.
        let topo = LayerTopology::infer(&mut net, (1, 2, 2)).unwrap();
        assert_eq!(topo.len(), 3);
    }

    #[test]
    fn shapes_and_injectability() {
        let mut net = net();
        let topo = LayerTopology::infer(&mut net, (1, 2, 2)).unwrap();

        assert_eq!(topo.shape(true, "sc1").unwrap(), &[2, 1, 1, 1]);
        assert_eq!(topo.shape(false, "sc1").unwrap(), &[2, 2, 2]);
        assert_eq!(topo.shape(false, "sf1").unwrap(), &[3, 1, 1]);

        assert_eq!(topo.injectables(), vec!["sc1", "sf1"]);
        assert!(!topo.is_injectable("sd1"));
        assert!(!topo.is_injectable("nope"));
    }

    #[test]
    fn output_and_following() {
        let mut net = net();
        let topo = LayerTopology::infer(&mut net, (1, 2, 2)).unwrap();
        assert!(topo.is_output("sf1"));
        assert!(!topo.is_output("sc1"));
        assert_eq!(topo.output_name(), Some("sf1"));
        assert_eq!(topo.following("sc1").unwrap(), Some("sd1"));
        assert_eq!(topo.following("sf1").unwrap(), None);
    }

    #[test]
    fn unknown_layer_is_fatal() {
        let mut net = net();
        let topo = LayerTopology::infer(&mut net, (1, 2, 2)).unwrap();
        assert!(matches!(
            topo.position("missing"),
            Err(NetError::UnknownLayer(_))
        ));
    }
}
