/// Display name used for frames without managed metadata.
pub const NATIVE_FUNCTION_NAME: &str = "Unknown-Native-Function";
/// Display name used when the host fails to resolve a function name.
pub const UNKNOWN_FUNCTION_NAME: &str = "Unknown-Function";

/// A frame as handed out by the host's stack walker.
///
/// Resolving a `RawFrame` into a [`FunctionIdentifier`] is expensive, so the
/// result is cached per `(function_handle, frame_info)` pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RawFrame {
    /// Host function handle. Zero for native (unmanaged) frames.
    pub function_handle: u64,
    pub frame_info: u64,
}

impl RawFrame {
    pub const fn new(function_handle: u64, frame_info: u64) -> Self {
        Self {
            function_handle,
            frame_info,
        }
    }

    pub fn is_native(&self) -> bool {
        self.function_handle == 0
    }
}

/// Identifies a managed function independently of the frame it was observed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionIdentifier {
    pub token: u32,
    pub module_id: u64,
    pub is_valid: bool,
}

impl FunctionIdentifier {
    pub const fn new(token: u32, module_id: u64) -> Self {
        Self {
            token,
            module_id,
            is_valid: true,
        }
    }

    /// The identifier shared by every native or unresolvable frame.
    pub const fn invalid() -> Self {
        Self {
            token: 0,
            module_id: 0,
            is_valid: false,
        }
    }
}
