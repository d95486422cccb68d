//! Software packet-processing backend

use contracts::{BackendKind, DepthProcessorConfig, ProcessingBackend};
use tracing::debug;

/// Backend that applies the depth range in software
///
/// Stands in for any backend kind; GPU kinds keep their device index.
#[derive(Debug, Clone)]
pub struct SoftwareBackend {
    kind: BackendKind,
    gpu_id: Option<u32>,
    config: DepthProcessorConfig,
}

impl SoftwareBackend {
    pub fn new(kind: BackendKind, gpu_id: u32) -> Self {
        Self {
            kind,
            gpu_id: kind.uses_gpu_id().then_some(gpu_id),
            config: DepthProcessorConfig::default(),
        }
    }

    pub fn config(&self) -> &DepthProcessorConfig {
        &self.config
    }
}

impl ProcessingBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn gpu_id(&self) -> Option<u32> {
        self.gpu_id
    }

    fn configure(&mut self, config: &DepthProcessorConfig) {
        debug!(
            backend = %self.kind,
            min_depth_m = config.min_depth_m,
            max_depth_m = config.max_depth_m,
            bilateral = config.bilateral_filter,
            edge_aware = config.edge_aware_filter,
            "configure depth processor"
        );
        self.config = *config;
    }

    fn process_depth(&self, samples: &mut [f32]) {
        let (min, max) = self.config.range_mm();
        for sample in samples.iter_mut() {
            if !(min..=max).contains(&*sample) {
                *sample = 0.0;
            }
        }
    }
}
