//! Processing backend selection

use contracts::{BackendKind, ContractError, DepthProcessorConfig, DeviceDriver, ProcessingBackend};
use tracing::{info, warn};

/// Chooses and configures a packet-processing backend from driver capabilities
pub struct BackendFactory;

impl BackendFactory {
    /// Construct `kind` and hand it the depth processing parameters
    ///
    /// # Errors
    /// `ContractError::BackendUnavailable` if the driver does not offer `kind`.
    pub fn select<D: DeviceDriver + ?Sized>(
        driver: &D,
        kind: BackendKind,
        gpu_id: u32,
        depth: &DepthProcessorConfig,
    ) -> Result<Box<dyn ProcessingBackend>, ContractError> {
        let available = driver.available_backends();
        let backend = available
            .contains(&kind)
            .then(|| driver.create_backend(kind, gpu_id))
            .flatten();

        let Some(mut backend) = backend else {
            warn!(requested = %kind, ?available, "pipeline not available");
            return Err(ContractError::BackendUnavailable {
                requested: kind.to_string(),
                available: available.iter().map(ToString::to_string).collect(),
            });
        };

        backend.configure(depth);
        info!(backend = %kind, gpu_id = ?backend.gpu_id(), "pipeline selected");
        Ok(backend)
    }
}
