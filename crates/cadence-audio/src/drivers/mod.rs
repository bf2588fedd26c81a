//! Built-in decoder drivers.

pub mod pcm;
pub mod symphonia;

use crate::driver::DriverRegistry;

pub use self::pcm::PcmDriver;
pub use self::symphonia::SymphoniaDriver;

/// Register every compiled-in driver family.
pub fn register_builtin(registry: &mut DriverRegistry) {
    registry.register(pcm::factory());
    registry.register(symphonia::factory());
}
