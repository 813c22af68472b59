/*!
 * macOS Address Space
 * Free regions from a `mach_vm_region` walk, commits through `mach_vm_allocate`
 */

use crate::core::errors::{BufferError, BufferResult};
use crate::core::range::AddressRange;
use crate::core::sysinfo::system_info;
use crate::core::types::{Address, Size};
use crate::memory::traits::PlatformAllocator;
use mach2::kern_return::{KERN_INVALID_ADDRESS, KERN_SUCCESS};
use mach2::message::mach_msg_type_number_t;
use mach2::port::mach_port_t;
use mach2::traps::mach_task_self;
use mach2::vm::{mach_vm_allocate, mach_vm_deallocate, mach_vm_region};
use mach2::vm_prot::VM_PROT_NONE;
use mach2::vm_region::{vm_region_basic_info_data_64_t, vm_region_info_t, VM_REGION_BASIC_INFO_64};
use mach2::vm_statistics::VM_FLAGS_FIXED;
use mach2::vm_types::{mach_vm_address_t, mach_vm_size_t};
use std::mem;
use tracing::trace;

/// Address space of the current task on macOS
#[derive(Debug, Clone, Default)]
pub struct MacAllocator;

impl MacAllocator {
    pub fn new() -> Self {
        Self
    }
}

fn push_merged(free: &mut Vec<AddressRange>, range: AddressRange) {
    if let Some(last) = free.last_mut() {
        if last.end_inclusive.checked_add(1) == Some(range.start) {
            last.end_inclusive = range.end_inclusive;
            return;
        }
    }
    free.push(range);
}

impl PlatformAllocator for MacAllocator {
    fn max_address(&self) -> Address {
        system_info().max_address
    }

    fn allocation_granularity(&self) -> usize {
        system_info().allocation_granularity
    }

    fn free_regions(&self, min_address: Address, max_address: Address) -> BufferResult<Vec<AddressRange>> {
        let mut free = Vec::new();
        let mut current = min_address as mach_vm_address_t;
        let max = max_address as mach_vm_address_t;

        while current <= max {
            let mut region_address = current;
            let mut region_size: mach_vm_size_t = 0;
            let mut object_name: mach_port_t = 0;
            // SAFETY: plain-old-data struct
            let mut info: vm_region_basic_info_data_64_t = unsafe { mem::zeroed() };
            let mut count = (mem::size_of::<vm_region_basic_info_data_64_t>()
                / mem::size_of::<libc::c_int>()) as mach_msg_type_number_t;

            // SAFETY: every out pointer references a live local of the expected type
            let kr = unsafe {
                mach_vm_region(
                    mach_task_self(),
                    &mut region_address,
                    &mut region_size,
                    VM_REGION_BASIC_INFO_64,
                    &mut info as *mut _ as vm_region_info_t,
                    &mut count,
                    &mut object_name,
                )
            };

            if kr == KERN_INVALID_ADDRESS {
                // Nothing mapped at or above `current`
                push_merged(&mut free, AddressRange::new(current as Address, max_address));
                break;
            }

            if kr != KERN_SUCCESS {
                return Err(BufferError::MalformedPlatformData(format!(
                    "mach_vm_region failed at {current:#x} with {kr}"
                )));
            }

            if region_address > current {
                let gap_end = (region_address - 1).min(max);
                push_merged(&mut free, AddressRange::new(current as Address, gap_end as Address));
            }

            let region_end = region_address.saturating_add(region_size);
            if info.protection == VM_PROT_NONE && region_size > 0 && region_address <= max {
                let end = (region_end - 1).min(max);
                push_merged(&mut free, AddressRange::new(region_address as Address, end as Address));
            }

            if region_end <= current {
                break;
            }
            current = region_end;
        }

        Ok(free)
    }

    fn try_commit(&self, address: Address, size: Size) -> Option<Address> {
        let mut allocated = address as mach_vm_address_t;

        // SAFETY: VM_FLAGS_FIXED fails rather than replacing existing memory
        let kr = unsafe {
            mach_vm_allocate(
                mach_task_self(),
                &mut allocated,
                size as mach_vm_size_t,
                VM_FLAGS_FIXED,
            )
        };

        if kr != KERN_SUCCESS {
            trace!(address = format_args!("{address:#x}"), kr, "mach_vm_allocate refused candidate");
            return None;
        }

        if allocated as Address != address {
            self.release(allocated as Address, size);
            return None;
        }

        Some(address)
    }

    fn release(&self, address: Address, size: Size) {
        // SAFETY: only called on memory this allocator committed
        unsafe {
            mach_vm_deallocate(mach_task_self(), address as mach_vm_address_t, size as mach_vm_size_t);
        }
    }
}
