/// Filter shape of a single equalizer band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    HighPass,
    LowPass,
    LowShelf,
    HighShelf,
    Parametric,
}

/// One band of an equalizer curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqBand {
    pub filter_type: FilterType,
    /// Corner or center frequency in Hz.
    pub frequency: f32,
    /// Boost/cut in dB. Ignored by pass filters.
    pub gain_db: f32,
    /// Bandwidth in octaves; only parametric bands use it.
    pub bandwidth: f32,
}

impl EqBand {
    pub fn high_pass(frequency: f32) -> Self {
        Self::pass(FilterType::HighPass, frequency)
    }

    pub fn low_pass(frequency: f32) -> Self {
        Self::pass(FilterType::LowPass, frequency)
    }

    pub fn low_shelf(frequency: f32, gain_db: f32) -> Self {
        Self {
            filter_type: FilterType::LowShelf,
            frequency,
            gain_db,
            bandwidth: 1.0,
        }
    }

    pub fn high_shelf(frequency: f32, gain_db: f32) -> Self {
        Self {
            filter_type: FilterType::HighShelf,
            frequency,
            gain_db,
            bandwidth: 1.0,
        }
    }

    pub fn parametric(frequency: f32, gain_db: f32, bandwidth: f32) -> Self {
        Self {
            filter_type: FilterType::Parametric,
            frequency,
            gain_db,
            bandwidth,
        }
    }

    fn pass(filter_type: FilterType, frequency: f32) -> Self {
        Self {
            filter_type,
            frequency,
            gain_db: 0.0,
            bandwidth: 1.0,
        }
    }
}

/// Dynamics-processor parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsSettings {
    pub threshold_db: f32,
    /// Room between the threshold and full scale. Sets the compression ratio.
    pub headroom_db: f32,
    pub expansion_ratio: f32,
    pub expansion_threshold_db: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
}

impl DynamicsSettings {
    /// Effective compression ratio above the threshold.
    pub fn compression_ratio(&self) -> f32 {
        if self.headroom_db <= 0.0 {
            return 1.0;
        }
        (-self.threshold_db / self.headroom_db).max(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverbPreset {
    Plate,
}

/// Concrete configuration of one processing node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Equalizer { bands: Vec<EqBand> },
    Dynamics(DynamicsSettings),
    Reverb { preset: ReverbPreset, wet_dry_mix: f32 },
}

impl NodeConfig {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Equalizer { .. } => "equalizer",
            Self::Dynamics(_) => "dynamics",
            Self::Reverb { .. } => "reverb",
        }
    }
}
