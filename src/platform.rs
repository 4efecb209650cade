//! Platform services the encoder depends on but does not implement.
//!
//! Device opening, GEM buffer management and job submission live on the
//! other side of [`Platform`]; the crate only ever sees device-visible
//! buffers as [`DmaRegion`] records. Tests plug in a simulated platform,
//! bring-up harnesses plug in the DRM ioctl layer.

use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

use alloc::vec::Vec;

use crate::err::NpuError;
use crate::task::SubmitArgs;

bitflags::bitflags! {
    /// Allocation flags for device-visible memory, mirroring the driver's
    /// memory-create interface.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemFlags: u32 {
        const CACHEABLE = 1 << 0;
        const NON_CACHEABLE = 1 << 1;
        const WRITE_COMBINE = 1 << 2;
        const KERNEL_MAPPING = 1 << 3;
        const IOMMU = 1 << 4;
        const ZEROING = 1 << 5;
    }
}

/// One device-visible buffer.
#[derive(Debug)]
pub struct DmaRegion {
    /// CPU mapping of the buffer.
    pub virt: NonNull<u8>,
    /// Address the NPU uses to reach the buffer.
    pub dma_addr: u64,
    /// Kernel object address, as reported by the driver; submission
    /// identifies the task buffer by this value.
    pub obj_addr: u64,
    /// Driver handle, used for destroy and flink.
    pub handle: u32,
    /// Usable size in bytes.
    pub size: usize,
}

/// Services provided by the environment hosting the NPU.
pub trait Platform {
    /// Allocates a device-visible buffer of at least `size` bytes.
    fn mem_create(&mut self, size: usize, flags: MemFlags) -> Result<DmaRegion, NpuError>;

    /// Returns a buffer to the driver. Must accept regions from partially
    /// failed operations in any order.
    fn mem_destroy(&mut self, region: DmaRegion);

    /// Submits a job and blocks until it completes or the timeout expires.
    fn submit(&mut self, args: &SubmitArgs) -> Result<(), NpuError>;

    /// Publishes a buffer under a global flink name.
    fn flink_export(&mut self, _handle: u32) -> Result<u32, NpuError> {
        Err(NpuError::Unsupported)
    }

    /// Opens a buffer published by another client; returns its handle and
    /// size.
    fn flink_import(&mut self, _name: u32) -> Result<(u32, usize), NpuError> {
        Err(NpuError::Unsupported)
    }
}

/// Typed element view over a [`DmaRegion`].
///
/// All element access is volatile: the device reads and writes the same
/// bytes, so the compiler must not cache or elide them.
#[derive(Debug)]
pub struct DeviceVec<T> {
    region: DmaRegion,
    len: usize,
    _elem: PhantomData<T>,
}

impl<T: Copy> DeviceVec<T> {
    /// Wraps a region as `len` elements of `T`.
    ///
    /// The region must be at least `len * size_of::<T>()` bytes and
    /// aligned for `T`.
    pub fn from_region(region: DmaRegion, len: usize) -> Self {
        assert!(region.size >= len * size_of::<T>());
        assert_eq!(region.virt.as_ptr() as usize % align_of::<T>(), 0);
        Self {
            region,
            len,
            _elem: PhantomData,
        }
    }

    /// Allocates a zero-filled vector of `len` elements.
    pub fn zeroed<P: Platform>(
        platform: &mut P,
        len: usize,
        flags: MemFlags,
    ) -> Result<Self, NpuError> {
        let size = len * size_of::<T>();
        let region = platform.mem_create(size, flags)?;
        unsafe { core::ptr::write_bytes(region.virt.as_ptr(), 0, size) };
        Ok(Self::from_region(region, len))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address the NPU uses to reach element 0.
    pub fn dma_addr(&self) -> u64 {
        self.region.dma_addr
    }

    pub fn region(&self) -> &DmaRegion {
        &self.region
    }

    pub fn set(&mut self, index: usize, value: T) {
        assert!(index < self.len);
        unsafe {
            (self.region.virt.as_ptr() as *mut T)
                .add(index)
                .write_volatile(value)
        }
    }

    pub fn get(&self, index: usize) -> T {
        assert!(index < self.len);
        unsafe {
            (self.region.virt.as_ptr() as *const T)
                .add(index)
                .read_volatile()
        }
    }

    pub fn copy_from_slice(&mut self, src: &[T]) {
        assert!(src.len() <= self.len);
        for (i, v) in src.iter().enumerate() {
            self.set(i, *v);
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    /// Returns the backing region to the platform.
    pub fn free<P: Platform>(self, platform: &mut P) {
        platform.mem_destroy(self.region);
    }
}
