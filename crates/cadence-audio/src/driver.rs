//! Decoder driver interface and the registry of compiled-in driver families.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use cadence_core::{Result, SampleFormat};

use crate::buffer::ByteBuffer;
use crate::demux::Demuxer;
use crate::session::StreamHeader;

/// Runtime requests sent to a driver through [`AudioDriver::control`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    /// Can the driver output this sample format?
    QueryFormat(SampleFormat),
    /// Drop internal decoder state after a seek.
    Resync,
    /// Skip one compressed frame natively.
    SkipFrame,
}

/// Answer to a [`ControlOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResult {
    True,
    False,
    Unsupported,
}

/// State a driver may read and update while it runs.
pub struct DriverContext<'a> {
    /// Negotiated stream values; drivers fill in rate, channels and sizes.
    pub header: &'a mut StreamHeader,
    /// Source of compressed packets.
    pub demuxer: &'a mut dyn Demuxer,
    /// Input staging buffer, sized by the driver's `in_min_size`.
    pub input: &'a mut ByteBuffer,
}

/// One decoder instance, owned by a single stream.
pub trait AudioDriver: Send {
    /// Prepare the driver and declare buffer requirements
    /// (`in_min_size`, `out_min_size`).
    fn preinit(&mut self, ctx: &mut DriverContext<'_>) -> Result<()>;

    /// Open the decoder; must set a non-zero sample rate and channel count.
    fn init(&mut self, ctx: &mut DriverContext<'_>) -> Result<()>;

    /// Decode at least `min_len` bytes into `dest` where possible, never more
    /// than `dest.len()`.
    ///
    /// Returns the number of bytes written; `Ok(0)` means no more data.
    fn decode(&mut self, ctx: &mut DriverContext<'_>, dest: &mut [u8], min_len: usize)
        -> Result<usize>;

    fn control(&mut self, _ctx: &mut DriverContext<'_>, _op: ControlOp) -> ControlResult {
        ControlResult::Unsupported
    }

    fn uninit(&mut self, _ctx: &mut DriverContext<'_>) {}
}

/// Static description of a driver family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverInfo {
    /// Family id referenced by codec descriptors.
    pub short_name: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    pub comment: &'static str,
}

/// Factory function creating one driver instance.
pub type CreateFn = Arc<dyn Fn() -> Box<dyn AudioDriver> + Send + Sync>;

/// A compiled-in driver family.
#[derive(Clone)]
pub struct DriverFactory {
    pub info: DriverInfo,
    pub create: CreateFn,
}

impl DriverFactory {
    pub fn new<F>(info: DriverInfo, create: F) -> Self
    where
        F: Fn() -> Box<dyn AudioDriver> + Send + Sync + 'static,
    {
        Self {
            info,
            create: Arc::new(create),
        }
    }

    /// Create a fresh driver instance.
    pub fn instantiate(&self) -> Box<dyn AudioDriver> {
        (self.create)()
    }
}

impl Debug for DriverFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverFactory")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Registry of available driver families, keyed by short name.
#[derive(Debug, Default, Clone)]
pub struct DriverRegistry {
    factories: Vec<DriverFactory>,
    index: HashMap<&'static str, usize>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in drivers registered.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_builtin(&mut registry);
        registry
    }

    /// Register a driver family, replacing any family with the same name.
    pub fn register(&mut self, factory: DriverFactory) {
        let name = factory.info.short_name;
        if let Some(&slot) = self.index.get(name) {
            self.factories[slot] = factory;
        } else {
            self.index.insert(name, self.factories.len());
            self.factories.push(factory);
        }
    }

    /// Look up a family by short name.
    pub fn get(&self, family: &str) -> Option<&DriverFactory> {
        self.index.get(family).map(|&slot| &self.factories[slot])
    }

    pub fn is_registered(&self, family: &str) -> bool {
        self.index.contains_key(family)
    }

    /// Families in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &DriverFactory> {
        self.factories.iter()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Describe the available driver families, in registration order.
pub fn list_drivers(registry: &DriverRegistry) -> Vec<DriverInfo> {
    registry.iter().map(|f| f.info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDriver;

    fn info(short_name: &'static str) -> DriverInfo {
        DriverInfo {
            short_name,
            name: "Mock decoder",
            comment: "",
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = DriverRegistry::new();
        registry.register(DriverFactory::new(info("a"), || {
            Box::new(MockDriver::default())
        }));
        registry.register(DriverFactory::new(info("b"), || {
            Box::new(MockDriver::default())
        }));

        assert!(registry.is_registered("a"));
        assert!(!registry.is_registered("c"));
        assert_eq!(registry.get("b").map(|f| f.info.short_name), Some("b"));

        let names: Vec<_> = list_drivers(&registry)
            .iter()
            .map(|i| i.short_name)
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_register_replaces_same_family() {
        let mut registry = DriverRegistry::new();
        registry.register(DriverFactory::new(info("a"), || {
            Box::new(MockDriver::default())
        }));
        let mut replacement = info("a");
        replacement.name = "Replacement";
        registry.register(DriverFactory::new(replacement, || {
            Box::new(MockDriver::default())
        }));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").map(|f| f.info.name), Some("Replacement"));
    }

    #[test]
    fn test_builtin_drivers() {
        let registry = DriverRegistry::with_builtin_drivers();
        assert!(registry.is_registered("pcm"));
        assert!(registry.is_registered("symphonia"));
    }
}
