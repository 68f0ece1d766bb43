use crate::frame::{FunctionIdentifier, RawFrame, NATIVE_FUNCTION_NAME, UNKNOWN_FUNCTION_NAME};
use crate::host::RuntimeHost;
use crate::lru::BoundedLru;

pub const NAME_CACHE_CAPACITY: usize = 5000;
pub const FUNCTION_IDENTIFIER_CACHE_CAPACITY: usize = 2000;

/// The two resolution caches shared by the capture and allocation paths.
///
/// - `names`: function -> display name
/// - `function_identifiers`: raw frame -> function, to avoid repeated
///   metadata lookups while the runtime is paused
#[derive(Debug)]
pub struct NameCache {
    names: BoundedLru<FunctionIdentifier, String>,
    function_identifiers: BoundedLru<RawFrame, FunctionIdentifier>,
    misses: u32,
}

impl NameCache {
    pub fn new() -> Self {
        Self::with_capacities(NAME_CACHE_CAPACITY, FUNCTION_IDENTIFIER_CACHE_CAPACITY)
    }

    pub fn with_capacities(names: usize, function_identifiers: usize) -> Self {
        Self {
            names: BoundedLru::new(names),
            function_identifiers: BoundedLru::new(function_identifiers),
            misses: 0,
        }
    }

    pub fn function_identifier(&mut self, host: &dyn RuntimeHost, frame: RawFrame) -> FunctionIdentifier {
        if frame.is_native() {
            return FunctionIdentifier::invalid();
        }
        if let Some(function) = self.function_identifiers.get(&frame) {
            return *function;
        }

        let function = match host.resolve_function_identifier(frame) {
            Ok(function) => function,
            Err(err) => {
                log::debug!("Could not resolve frame {:?}: {}", frame, err);
                FunctionIdentifier::invalid()
            }
        };
        self.function_identifiers.put(frame, function);
        function
    }

    pub fn function_name(&mut self, host: &dyn RuntimeHost, function: &FunctionIdentifier) -> String {
        if let Some(name) = self.names.get(function) {
            return name.clone();
        }
        self.misses = self.misses.saturating_add(1);

        let name = if !function.is_valid {
            NATIVE_FUNCTION_NAME.to_owned()
        } else {
            match host.resolve_function_name(function) {
                Ok(name) => name,
                Err(err) => {
                    log::debug!("Could not resolve name of {:?}: {}", function, err);
                    UNKNOWN_FUNCTION_NAME.to_owned()
                }
            }
        };
        // The evicted name is simply dropped
        self.names.put(*function, name.clone());
        name
    }

    /// Returns the name cache misses counted since the previous call.
    pub fn take_misses(&mut self) -> u32 {
        std::mem::take(&mut self.misses)
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.function_identifiers.clear();
        self.misses = 0;
    }
}

impl Default for NameCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    #[test]
    fn test_names_are_cached() {
        let host = FakeHost::new();
        let function = FunctionIdentifier::new(1, 1);
        host.set_function_name(function, "App.Main");

        let mut cache = NameCache::new();
        assert_eq!(cache.function_name(&host, &function), "App.Main");
        assert_eq!(cache.function_name(&host, &function), "App.Main");
        assert_eq!(host.name_resolutions(), 1);
        assert_eq!(cache.take_misses(), 1);
        assert_eq!(cache.take_misses(), 0);
    }

    #[test]
    fn test_fallback_names() {
        let host = FakeHost::new();
        let mut cache = NameCache::new();

        assert_eq!(
            cache.function_name(&host, &FunctionIdentifier::invalid()),
            NATIVE_FUNCTION_NAME
        );
        // Unknown to the host: resolution fails
        assert_eq!(
            cache.function_name(&host, &FunctionIdentifier::new(9, 9)),
            UNKNOWN_FUNCTION_NAME
        );
        assert_eq!(host.name_resolutions(), 1);
    }

    #[test]
    fn test_function_identifiers_are_cached() {
        let host = FakeHost::new();
        let frame = RawFrame::new(0x1000, 1);
        host.set_function_identifier(frame, FunctionIdentifier::new(5, 6));

        let mut cache = NameCache::new();
        assert_eq!(cache.function_identifier(&host, frame), FunctionIdentifier::new(5, 6));
        assert_eq!(cache.function_identifier(&host, frame), FunctionIdentifier::new(5, 6));
        assert_eq!(host.identifier_resolutions(), 1);

        // Native frames never reach the host
        assert_eq!(
            cache.function_identifier(&host, RawFrame::new(0, 1)),
            FunctionIdentifier::invalid()
        );
        // Failed resolutions fall back to the invalid identifier
        assert_eq!(
            cache.function_identifier(&host, RawFrame::new(0x2000, 1)),
            FunctionIdentifier::invalid()
        );
        assert_eq!(host.identifier_resolutions(), 2);
    }

    #[test]
    fn test_bounded() {
        let host = FakeHost::new();
        let mut cache = NameCache::with_capacities(2, 2);
        for token in 1..=3 {
            host.set_function_name(FunctionIdentifier::new(token, 1), &format!("f{}", token));
            cache.function_name(&host, &FunctionIdentifier::new(token, 1));
        }
        assert_eq!(host.name_resolutions(), 3);

        // f1 was evicted and must be resolved again
        cache.function_name(&host, &FunctionIdentifier::new(1, 1));
        assert_eq!(host.name_resolutions(), 4);
        cache.function_name(&host, &FunctionIdentifier::new(3, 1));
        assert_eq!(host.name_resolutions(), 4);
    }
}
