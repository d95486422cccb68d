//! Mock driver
//!
//! Enumeration and open with injectable failures.

use contracts::{
    BackendKind, ContractError, Device, DeviceDriver, MockDriverConfig, ProcessingBackend,
};
use tracing::{info, instrument, warn};

use crate::backend::SoftwareBackend;
use crate::events::EventLog;
use crate::mock_device::MockDevice;

/// Mock device driver
pub struct MockDriver {
    config: MockDriverConfig,
    enumerated: Vec<String>,
    events: EventLog,
}

impl MockDriver {
    /// Create a mock driver with default configuration (one device)
    pub fn new() -> Self {
        Self::with_config(MockDriverConfig::default())
    }

    /// Create a mock driver with failure injection
    pub fn with_config(config: MockDriverConfig) -> Self {
        Self {
            config,
            enumerated: Vec::new(),
            events: EventLog::new(),
        }
    }

    pub fn config(&self) -> &MockDriverConfig {
        &self.config
    }

    /// Lifecycle calls made on devices opened by this driver
    pub fn events(&self) -> EventLog {
        self.events.clone()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDriver for MockDriver {
    fn enumerate_devices(&mut self) -> usize {
        self.enumerated = (0..self.config.device_count)
            .map(|index| self.config.serial_at(index))
            .collect();
        self.enumerated.len()
    }

    fn default_serial(&self) -> Option<String> {
        self.enumerated.first().cloned()
    }

    fn serials(&self) -> Vec<String> {
        self.enumerated.clone()
    }

    fn available_backends(&self) -> Vec<BackendKind> {
        self.config.backends.clone()
    }

    fn create_backend(&self, kind: BackendKind, gpu_id: u32) -> Option<Box<dyn ProcessingBackend>> {
        self.config
            .backends
            .contains(&kind)
            .then(|| Box::new(SoftwareBackend::new(kind, gpu_id)) as Box<dyn ProcessingBackend>)
    }

    #[instrument(name = "mock_driver_open", skip(self, backend), fields(serial = %serial, backend = %backend.kind()))]
    fn open_device(
        &mut self,
        serial: &str,
        backend: Box<dyn ProcessingBackend>,
    ) -> Result<Box<dyn Device>, ContractError> {
        if self.enumerated.is_empty() {
            return Err(ContractError::NoDeviceFound);
        }
        if !self.enumerated.iter().any(|s| s == serial) {
            warn!("serial not among enumerated devices");
            return Err(ContractError::device_open(serial, "device not connected"));
        }
        if self.config.fail_open.iter().any(|s| s == serial) {
            return Err(ContractError::device_open(serial, "mock open failure"));
        }

        info!(firmware = %self.config.firmware, "device opened");
        Ok(Box::new(MockDevice::new(
            serial.to_string(),
            self.config.clone(),
            backend,
            self.events.clone(),
        )))
    }
}
