use std::ops::{Deref, DerefMut};

use super::device::{Device, PipelineState};

/// Restores the device pipeline state when dropped.
///
/// Every pass runs through a guard, so whatever it binds, including on an
/// early error return, is undone before the caller sees the device again.
pub struct StateGuard<'d> {
    device: &'d mut Device,
    saved: PipelineState,
}

impl<'d> StateGuard<'d> {
    pub fn new(device: &'d mut Device) -> Self {
        let saved = device.state().clone();
        StateGuard { device, saved }
    }
}

impl Deref for StateGuard<'_> {
    type Target = Device;

    fn deref(&self) -> &Device {
        self.device
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut Device {
        self.device
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.device.restore_state(self.saved.clone());
    }
}
