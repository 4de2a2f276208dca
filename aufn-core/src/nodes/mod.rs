//! Effect resolution and the DSP stages the graph instantiates.

pub mod biquad;
pub mod dynamics;
pub mod factory;
pub mod node_config;
pub mod reverb;

use crate::models::audio_models::StreamFormat;
use crate::models::error::GraphError;
use crate::traits::processor::Processor;

use self::biquad::EqProcessor;
use self::dynamics::DynamicsProcessor;
use self::node_config::NodeConfig;
use self::reverb::ReverbProcessor;

/// Build the live processor for a configuration in the given link format.
pub fn instantiate(config: &NodeConfig, format: StreamFormat) -> Result<Box<dyn Processor>, GraphError> {
    if !format.is_valid() {
        return Err(GraphError::ConnectionFailed(format!(
            "cannot build {} for {} Hz / {} ch",
            config.kind_name(),
            format.sample_rate,
            format.channels
        )));
    }
    let sample_rate = format.sample_rate as f32;
    let channels = format.channels as usize;
    let processor: Box<dyn Processor> = match config {
        NodeConfig::Equalizer { bands } => Box::new(EqProcessor::new(bands, sample_rate, channels)),
        NodeConfig::Dynamics(settings) => Box::new(DynamicsProcessor::new(*settings, sample_rate)),
        NodeConfig::Reverb {
            preset,
            wet_dry_mix,
        } => Box::new(ReverbProcessor::new(*preset, *wet_dry_mix, sample_rate, channels)),
    };
    Ok(processor)
}
