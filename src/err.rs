/// Error type shared by every operation in the crate.
///
/// Descriptor building, buffer management, submission and verification all
/// funnel into this one enum so callers can match on the failure class
/// without caring which stage produced it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NpuError {
    /// The requested matmul shape violates a hardware limit.
    #[error("unsupported shape M={m} K={k} N={n}: {reason}")]
    Shape {
        m: u32,
        k: u32,
        n: u32,
        reason: &'static str,
    },

    /// The operands do not fit the convolution buffer.
    #[error("cbuf capacity exceeded for {what}: need {need}, available {avail}")]
    Capacity {
        what: &'static str,
        need: u32,
        avail: u32,
    },

    /// The platform failed to provide a device-visible buffer.
    #[error("failed to allocate {size} bytes of device memory")]
    Allocation { size: usize },

    /// A buffer landed above the range addressable by the 32-bit register file.
    #[error("device address {addr:#x} does not fit a 32-bit register")]
    AddressRange { addr: u64 },

    /// The job did not complete within the caller's deadline.
    #[error("job timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u32 },

    /// The driver rejected or aborted the job.
    #[error("device error {code}")]
    Device { code: i32 },

    /// The platform does not implement the requested service.
    #[error("operation not supported by this platform")]
    Unsupported,

    /// A tiling coordinate was outside its tensor.
    #[error("coordinate out of range: {0}")]
    Coordinate(&'static str),

    /// A caller-supplied argument was malformed.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),

    /// The device output disagreed with the host reference.
    #[error("verification failed: {mismatches} of {total} elements differ")]
    Verification { mismatches: usize, total: usize },
}
