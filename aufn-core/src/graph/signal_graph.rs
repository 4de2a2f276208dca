use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{IoPreferences, StreamFormat, TapPoint};
use crate::models::effect::{ChainSpec, EffectDescriptor};
use crate::models::error::{GraphError, ResolutionError};
use crate::nodes::factory;
use crate::nodes::node_config::NodeConfig;
use crate::nodes::instantiate;
use crate::traits::audio_device::{AudioDevice, DeviceErrorCallback, RenderCallback};
use crate::traits::processor::Processor;

/// Observer attached to a running path. Receives every buffer, interleaved,
/// without altering it. Runs on the audio thread.
pub type TapCallback = Box<dyn FnMut(&[f32], StreamFormat) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

/// One end of a graph link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    HardwareInput,
    Node(NodeId),
    HardwareOutput,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    pub source: Endpoint,
    pub target: Endpoint,
    pub format: StreamFormat,
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildReport {
    /// Names of the stages now attached, in signal order.
    pub attached: Vec<String>,
    /// Stages skipped because their name did not resolve.
    pub skipped: Vec<ResolutionError>,
    /// Stages that resolved but could not be instantiated.
    pub omitted: Vec<(String, GraphError)>,
}

impl RebuildReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.omitted.is_empty()
    }
}

/// A live stage, owned exclusively by the graph.
struct GraphNode {
    id: NodeId,
    descriptor: EffectDescriptor,
    config: NodeConfig,
    processor: Box<dyn Processor>,
    position: usize,
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("name", &self.descriptor.name)
            .field("config", &self.config.kind_name())
            .field("position", &self.position)
            .finish()
    }
}

/// State shared between the control side and the render callback.
struct GraphCore {
    format: StreamFormat,
    nodes: Vec<GraphNode>,
    connections: Vec<Connection>,
    input_tap: Option<TapCallback>,
    output_tap: Option<TapCallback>,
}

impl GraphCore {
    fn new(format: StreamFormat) -> Self {
        Self {
            format,
            nodes: Vec::new(),
            connections: Vec::new(),
            input_tap: None,
            output_tap: None,
        }
    }

    fn has_taps(&self) -> bool {
        self.input_tap.is_some() || self.output_tap.is_some()
    }

    fn tap_slot(&mut self, point: TapPoint) -> &mut Option<TapCallback> {
        match point {
            TapPoint::Input => &mut self.input_tap,
            TapPoint::MixedOutput => &mut self.output_tap,
        }
    }

    /// Disconnect every link, then detach every node, newest first.
    fn tear_down(&mut self) {
        while let Some(link) = self.connections.pop() {
            log::trace!("disconnect {:?} -> {:?}", link.source, link.target);
        }
        while let Some(mut node) = self.nodes.pop() {
            node.processor.reset();
            log::debug!("detached {} ({:?})", node.descriptor.name, node.id);
        }
    }

    /// One hardware buffer: input tap, every stage in order, output tap.
    fn render(&mut self, buffer: &mut [f32]) {
        let format = self.format;
        let channels = format.channels as usize;

        if let Some(tap) = self.input_tap.as_mut() {
            tap(buffer, format);
        }
        for node in &mut self.nodes {
            node.processor.process(buffer, channels);
        }
        if let Some(tap) = self.output_tap.as_mut() {
            tap(buffer, format);
        }
    }
}

/// The single authoritative processing path:
///
/// ```text
/// [HardwareInput] → [node 0] → … → [node n-1] → [HardwareOutput]
/// ```
///
/// Owns the audio device. Rebuilds swap the whole path under one lock, so the
/// render thread sees either the old chain or the new one, never a mix.
pub struct SignalGraph<D: AudioDevice> {
    device: D,
    core: Arc<Mutex<GraphCore>>,
    chain: Option<ChainSpec>,
    next_node_id: u32,
}

impl<D: AudioDevice> SignalGraph<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            core: Arc::new(Mutex::new(GraphCore::new(StreamFormat::new(0.0, 0)))),
            chain: None,
            next_node_id: 1,
        }
    }

    /// Tear down the current path and wire `chain` in its place.
    ///
    /// Unknown or unbuildable stages are left out and listed in the report.
    /// If the path as a whole cannot be wired, the previous graph is kept.
    pub fn rebuild(&mut self, chain: &ChainSpec) -> Result<RebuildReport, GraphError> {
        if self.core.lock().has_taps() {
            log::warn!("rebuild rejected while taps are installed");
            return Err(GraphError::CaptureActive);
        }

        let format = self
            .device
            .input_format()
            .map_err(|e| GraphError::ConnectionFailed(format!("no input format: {}", e)))?;
        if !format.is_valid() {
            return Err(GraphError::ConnectionFailed(format!(
                "unusable input format: {} Hz / {} ch",
                format.sample_rate, format.channels
            )));
        }

        let mut report = RebuildReport::default();
        let mut nodes = Vec::new();
        for descriptor in chain.stages() {
            let config = match factory::resolve(descriptor) {
                Ok(Some(config)) => config,
                Ok(None) => {
                    log::debug!("{} disabled, passing through", descriptor.name);
                    continue;
                }
                Err(e) => {
                    log::warn!("skipping stage: {}", e);
                    report.skipped.push(e);
                    continue;
                }
            };
            let processor = match instantiate(&config, format) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("omitting {}: {}", descriptor.name, e);
                    report.omitted.push((descriptor.name.clone(), e));
                    continue;
                }
            };
            let id = NodeId(self.next_node_id);
            self.next_node_id += 1;
            report.attached.push(descriptor.name.clone());
            nodes.push(GraphNode {
                id,
                descriptor: descriptor.clone(),
                config,
                processor,
                position: nodes.len(),
            });
        }

        let connections = wire(&nodes, format)?;

        {
            let mut core = self.core.lock();
            core.tear_down();
            core.format = format;
            core.nodes = nodes;
            core.connections = connections;
        }
        self.chain = Some(chain.clone());

        log::info!(
            "graph rebuilt: {} stage(s) [{}], {} skipped",
            report.attached.len(),
            report.attached.join(" → "),
            report.skipped.len() + report.omitted.len()
        );
        Ok(report)
    }

    /// Stop the engine, drop every node, link and tap, and forget the chain.
    pub fn reset(&mut self) {
        if let Err(e) = self.stop_engine() {
            log::warn!("engine stop during reset failed: {}", e);
        }
        {
            let mut core = self.core.lock();
            core.input_tap = None;
            core.output_tap = None;
            core.tear_down();
        }
        self.chain = None;
        log::debug!("graph reset");
    }

    /// Whether a chain has been wired since construction or the last reset.
    pub fn is_built(&self) -> bool {
        self.chain.is_some()
    }

    pub fn chain(&self) -> Option<&ChainSpec> {
        self.chain.as_ref()
    }

    pub fn format(&self) -> StreamFormat {
        self.core.lock().format
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.core.lock().connections.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.core.lock().connections.len()
    }

    pub fn node_count(&self) -> usize {
        self.core.lock().nodes.len()
    }

    /// Stage names in signal order.
    pub fn node_names(&self) -> Vec<String> {
        self.core
            .lock()
            .nodes
            .iter()
            .map(|n| n.descriptor.name.clone())
            .collect()
    }

    /// Follow the links from the hardware input to the hardware output.
    ///
    /// Returns `None` if the path is broken or does not reach the output.
    pub fn signal_path(&self) -> Option<Vec<Endpoint>> {
        let core = self.core.lock();
        if core.connections.is_empty() {
            return None;
        }
        let mut path = vec![Endpoint::HardwareInput];
        let mut current = Endpoint::HardwareInput;
        while current != Endpoint::HardwareOutput {
            let next = core
                .connections
                .iter()
                .find(|c| c.source == current)?
                .target;
            if path.len() > core.connections.len() {
                return None;
            }
            path.push(next);
            current = next;
        }
        Some(path)
    }

    pub fn install_tap(&mut self, point: TapPoint, tap: TapCallback) -> Result<(), GraphError> {
        let mut core = self.core.lock();
        let slot = core.tap_slot(point);
        if slot.is_some() {
            return Err(GraphError::TapAlreadyInstalled(point));
        }
        *slot = Some(tap);
        log::debug!("tap installed on {:?}", point);
        Ok(())
    }

    /// Remove a tap. Returns `false` if none was installed.
    pub fn remove_tap(&mut self, point: TapPoint) -> bool {
        let removed = self.core.lock().tap_slot(point).take().is_some();
        if removed {
            log::debug!("tap removed from {:?}", point);
        }
        removed
    }

    pub fn has_taps(&self) -> bool {
        self.core.lock().has_taps()
    }

    /// Start the device with the render callback bound to this graph.
    pub fn start_engine(
        &mut self,
        preferences: IoPreferences,
        on_error: DeviceErrorCallback,
    ) -> Result<(), GraphError> {
        if !self.is_built() {
            return Err(GraphError::NotBuilt);
        }
        if self.device.is_running() {
            return Ok(());
        }
        let core = Arc::clone(&self.core);
        let render: RenderCallback = Arc::new(move |buffer: &mut [f32]| {
            core.lock().render(buffer);
        });
        self.device
            .start(preferences, render, on_error)
            .map_err(|e| match e {
                GraphError::EngineStartFailed(_) => e,
                other => GraphError::EngineStartFailed(other.to_string()),
            })?;
        log::info!("engine started");
        Ok(())
    }

    pub fn stop_engine(&mut self) -> Result<(), GraphError> {
        if !self.device.is_running() {
            return Ok(());
        }
        self.device.stop()?;
        log::info!("engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.device.is_running()
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

/// Build the linear link list for `nodes`, all in the shared input format.
fn wire(nodes: &[GraphNode], format: StreamFormat) -> Result<Vec<Connection>, GraphError> {
    let mut connections = Vec::with_capacity(nodes.len() + 1);
    let mut previous = Endpoint::HardwareInput;
    for node in nodes {
        let target = Endpoint::Node(node.id);
        connect(&mut connections, previous, target, format)?;
        previous = target;
    }
    connect(&mut connections, previous, Endpoint::HardwareOutput, format)?;
    Ok(connections)
}

fn connect(
    connections: &mut Vec<Connection>,
    source: Endpoint,
    target: Endpoint,
    format: StreamFormat,
) -> Result<(), GraphError> {
    if source == target || source == Endpoint::HardwareOutput || target == Endpoint::HardwareInput {
        return Err(GraphError::ConnectionFailed(format!(
            "invalid link {:?} -> {:?}",
            source, target
        )));
    }
    if connections.iter().any(|c| c.source == source || c.target == target) {
        return Err(GraphError::ConnectionFailed(format!(
            "{:?} -> {:?} would branch the path",
            source, target
        )));
    }
    connections.push(Connection {
        source,
        target,
        format,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::IoBufferDuration;
    use crate::testing::ManualDevice;

    fn preferences() -> IoPreferences {
        IoPreferences {
            sample_rate: 48000.0,
            buffer_duration: IoBufferDuration::Relaxed,
        }
    }

    fn no_errors() -> DeviceErrorCallback {
        Arc::new(|_: String| {})
    }

    fn full_chain() -> ChainSpec {
        ChainSpec::new(
            Some(EffectDescriptor::microphone_preset("Condenser", 0.7, 1500.0)),
            vec![
                EffectDescriptor::plugin("Compressor"),
                EffectDescriptor::plugin("Equalizer"),
                EffectDescriptor::plugin("Reverb"),
            ],
        )
    }

    fn node_endpoints(graph: &SignalGraph<ManualDevice>) -> Vec<Endpoint> {
        graph
            .signal_path()
            .unwrap()
            .into_iter()
            .filter(|e| matches!(e, Endpoint::Node(_)))
            .collect()
    }

    #[test]
    fn rebuild_wires_stages_in_chain_order() {
        let (device, _handle) = ManualDevice::new(48000.0, 2);
        let mut graph = SignalGraph::new(device);

        let report = graph.rebuild(&full_chain()).unwrap();

        assert!(report.is_clean());
        assert_eq!(graph.node_names(), ["Condenser", "Compressor", "Equalizer", "Reverb"]);
        let path = graph.signal_path().unwrap();
        assert_eq!(path.len(), 6);
        assert_eq!(path[0], Endpoint::HardwareInput);
        assert_eq!(path[5], Endpoint::HardwareOutput);
        assert_eq!(graph.connection_count(), 5);

        // Each link's source is the previous link's target.
        let links = graph.connections();
        for pair in links.windows(2) {
            assert_eq!(pair[0].target, pair[1].source);
        }
        assert!(links.iter().all(|c| c.format == StreamFormat::new(48000.0, 2)));
    }

    #[test]
    fn empty_chain_connects_input_to_output() {
        let (device, _handle) = ManualDevice::new(44100.0, 1);
        let mut graph = SignalGraph::new(device);

        graph.rebuild(&ChainSpec::empty()).unwrap();

        assert_eq!(graph.node_count(), 0);
        assert_eq!(
            graph.signal_path().unwrap(),
            vec![Endpoint::HardwareInput, Endpoint::HardwareOutput]
        );
    }

    #[test]
    fn unknown_stage_is_skipped_and_reported() {
        let (device, _handle) = ManualDevice::new(48000.0, 2);
        let mut graph = SignalGraph::new(device);
        let chain = ChainSpec::new(
            Some(EffectDescriptor::microphone_preset("Dynamic", 0.5, 1000.0)),
            vec![
                EffectDescriptor::plugin("Compressor"),
                EffectDescriptor::plugin("Flanger"),
                EffectDescriptor::plugin("Reverb"),
            ],
        );

        let report = graph.rebuild(&chain).unwrap();

        assert_eq!(report.skipped, vec![ResolutionError::UnknownEffect("Flanger".into())]);
        assert_eq!(graph.node_names(), ["Dynamic", "Compressor", "Reverb"]);
        assert_eq!(graph.signal_path().unwrap().len(), 5);
    }

    #[test]
    fn disabled_stage_is_not_attached() {
        let (device, _handle) = ManualDevice::new(48000.0, 2);
        let mut graph = SignalGraph::new(device);
        let chain = ChainSpec::new(
            None,
            vec![
                EffectDescriptor::plugin("Equalizer").disabled(),
                EffectDescriptor::plugin("Reverb"),
            ],
        );

        let report = graph.rebuild(&chain).unwrap();

        assert!(report.is_clean());
        assert_eq!(graph.node_names(), ["Reverb"]);
    }

    #[test]
    fn rebuild_replaces_previous_nodes() {
        let (device, _handle) = ManualDevice::new(48000.0, 2);
        let mut graph = SignalGraph::new(device);
        graph.rebuild(&full_chain()).unwrap();
        let before = node_endpoints(&graph);

        graph
            .rebuild(&ChainSpec::new(None, vec![EffectDescriptor::plugin("Reverb")]))
            .unwrap();

        let after = node_endpoints(&graph);
        assert_eq!(after.len(), 1);
        assert!(!before.contains(&after[0]));
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn reset_is_idempotent() {
        let (device, _handle) = ManualDevice::new(48000.0, 2);
        let mut graph = SignalGraph::new(device);
        graph.rebuild(&full_chain()).unwrap();

        graph.reset();
        let once = (graph.node_count(), graph.connection_count(), graph.is_built());
        graph.reset();
        let twice = (graph.node_count(), graph.connection_count(), graph.is_built());

        assert_eq!(once, (0, 0, false));
        assert_eq!(once, twice);
        assert!(graph.signal_path().is_none());
    }

    #[test]
    fn rebuild_rejected_while_tapped_leaves_graph_untouched() {
        let (device, _handle) = ManualDevice::new(48000.0, 2);
        let mut graph = SignalGraph::new(device);
        graph.rebuild(&full_chain()).unwrap();
        graph
            .install_tap(TapPoint::MixedOutput, Box::new(|_: &[f32], _: StreamFormat| {}))
            .unwrap();
        let before = graph.connections();

        let result = graph.rebuild(&ChainSpec::empty());

        assert_eq!(result, Err(GraphError::CaptureActive));
        assert_eq!(graph.connections(), before);
        assert_eq!(graph.chain(), Some(&full_chain()));
    }

    #[test]
    fn failed_format_keeps_previous_graph() {
        let (device, handle) = ManualDevice::new(48000.0, 2);
        let mut graph = SignalGraph::new(device);
        graph.rebuild(&full_chain()).unwrap();

        handle.set_format(StreamFormat::new(0.0, 0));
        let result = graph.rebuild(&ChainSpec::empty());

        assert!(matches!(result, Err(GraphError::ConnectionFailed(_))));
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.connection_count(), 5);
    }

    #[test]
    fn second_tap_on_same_point_rejected() {
        let (device, _handle) = ManualDevice::new(48000.0, 1);
        let mut graph = SignalGraph::new(device);
        graph.install_tap(TapPoint::Input, Box::new(|_: &[f32], _: StreamFormat| {})).unwrap();
        assert_eq!(
            graph.install_tap(TapPoint::Input, Box::new(|_: &[f32], _: StreamFormat| {})),
            Err(GraphError::TapAlreadyInstalled(TapPoint::Input))
        );
        assert!(graph.remove_tap(TapPoint::Input));
        assert!(!graph.remove_tap(TapPoint::Input));
    }

    #[test]
    fn engine_requires_built_graph() {
        let (device, _handle) = ManualDevice::new(48000.0, 1);
        let mut graph = SignalGraph::new(device);
        assert_eq!(
            graph.start_engine(preferences(), no_errors()),
            Err(GraphError::NotBuilt)
        );
    }

    #[test]
    fn taps_see_input_before_and_output_after_stages() {
        let (device, handle) = ManualDevice::new(48000.0, 1);
        let mut graph = SignalGraph::new(device);
        graph
            .rebuild(&ChainSpec::new(None, vec![EffectDescriptor::plugin("Reverb")]))
            .unwrap();

        let seen_in = Arc::new(Mutex::new(Vec::new()));
        let seen_out = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&seen_in), Arc::clone(&seen_out));
        graph
            .install_tap(TapPoint::Input, Box::new(move |buf: &[f32], _: StreamFormat| a.lock().extend_from_slice(buf)))
            .unwrap();
        graph
            .install_tap(
                TapPoint::MixedOutput,
                Box::new(move |buf: &[f32], _: StreamFormat| b.lock().extend_from_slice(buf)),
            )
            .unwrap();
        graph.start_engine(preferences(), no_errors()).unwrap();

        let out = handle.push(&[1.0, 0.0, 0.0]);

        assert_eq!(*seen_in.lock(), vec![1.0, 0.0, 0.0]);
        assert_eq!(*seen_out.lock(), out);
        // 30 % wet plate: the first sample keeps 70 % of the dry signal
        assert!((out[0] - 0.7).abs() < 1e-6);

        graph.stop_engine().unwrap();
        assert!(!graph.is_running());
        assert!(handle.push(&[1.0]).is_empty());
    }

    #[test]
    fn engine_start_failure_is_reported() {
        let (device, handle) = ManualDevice::new(48000.0, 1);
        handle.fail_next_start("device busy");
        let mut graph = SignalGraph::new(device);
        graph.rebuild(&ChainSpec::empty()).unwrap();

        let result = graph.start_engine(preferences(), no_errors());

        assert_eq!(result, Err(GraphError::EngineStartFailed("device busy".into())));
        assert!(!graph.is_running());
    }
}
