// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Kernels, their lookup by name, and positional argument binding.
//!
//! Arguments are bound by raw bytes: slot `i` receives the bytes of the `i`th value.
//! Every bound value is recorded as a [`BoundArg`] carrying its slot and size, and,
//! for graphics-shared resources, the resource's ownership state, which
//! [`crate::CommandQueue::dispatch`] checks before launching.

use crate::error::{ArgumentError, Error};
use crate::imp;
use crate::pixel_formats::{ReprC, as_bytes};
use crate::resources::ownership::Ownership;
use crate::status;

/// The bytes a value contributes to an argument slot.
#[derive(Debug, Clone)]
pub struct ArgValue {
    bytes: Vec<u8>,
    shared: Option<Ownership>,
}

impl ArgValue {
    /// A by-value argument.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        ArgValue {
            bytes: bytes.into(),
            shared: None,
        }
    }

    /// A memory object whose use must be bracketed by acquire and release.
    pub(crate) fn shared(bytes: Vec<u8>, ownership: Ownership) -> Self {
        ArgValue {
            bytes,
            shared: Some(ownership),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Something that can be bound to a kernel argument slot.
///
/// Every [`ReprC`] value binds its own bytes. Memory objects ([`crate::ImageArray`],
/// [`crate::SharedTexture`], [`crate::Buffer`]) bind their native handle.
pub trait KernelArg {
    fn arg_value(&self) -> ArgValue;
}

impl<T: ReprC> KernelArg for T {
    fn arg_value(&self) -> ArgValue {
        ArgValue::from_bytes(as_bytes(std::slice::from_ref(self)))
    }
}

/// A value that has been bound to a slot.
#[derive(Debug, Clone)]
pub struct BoundArg {
    slot: u32,
    size: usize,
    shared: Option<Ownership>,
}

impl BoundArg {
    pub fn slot(&self) -> u32 {
        self.slot
    }
    /// Size in bytes passed to the runtime.
    pub fn size(&self) -> usize {
        self.size
    }
    /// True when the value is a graphics-shared resource.
    pub fn is_shared(&self) -> bool {
        self.shared.is_some()
    }
}

///A compiled kernel entry point.
#[derive(Debug)]
pub struct Kernel {
    pub(crate) imp: imp::Kernel,
    name: String,
    num_args: u32,
    slots: Vec<Option<BoundArg>>,
}

impl Kernel {
    pub(crate) fn new(imp: imp::Kernel, name: String) -> Result<Self, Error> {
        let num_args = imp.num_args()?;
        Ok(Kernel {
            imp,
            name,
            num_args,
            slots: vec![None; num_args as usize],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of parameters the kernel declares.
    pub fn num_args(&self) -> u32 {
        self.num_args
    }

    fn argument_error(&self, error: ArgumentError) -> Error {
        Error::Argument {
            kernel: self.name.clone(),
            error,
        }
    }

    /// Binds `args` to slots `0..args.len()`.
    ///
    /// The count must equal [`Kernel::num_args`]; on a mismatch nothing is bound.
    ///
    /// Slots are bound in order. If any of them is rejected, every binding record is
    /// cleared, and the kernel can't be dispatched until its arguments are bound again.
    pub fn set_args(&mut self, args: &[&dyn KernelArg]) -> Result<(), Error> {
        if args.len() != self.num_args as usize {
            return Err(self.argument_error(ArgumentError::CountMismatch {
                expected: self.num_args,
                supplied: args.len(),
            }));
        }
        for (slot, arg) in args.iter().enumerate() {
            if let Err(e) = self.bind(slot as u32, arg.arg_value()) {
                self.slots.fill(None);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Binds one slot.
    pub fn set_arg(&mut self, slot: u32, arg: &dyn KernelArg) -> Result<(), Error> {
        if slot >= self.num_args {
            return Err(self.argument_error(ArgumentError::SlotOutOfRange {
                slot,
                count: self.num_args,
            }));
        }
        self.bind(slot, arg.arg_value())
    }

    fn bind(&mut self, slot: u32, value: ArgValue) -> Result<(), Error> {
        let size = value.bytes.len();
        if let Err(error) = self.imp.set_arg(slot, &value.bytes) {
            if error.code() == status::CL_INVALID_ARG_INDEX {
                return Err(self.argument_error(ArgumentError::SlotOutOfRange {
                    slot,
                    count: self.num_args,
                }));
            }
            return Err(self.argument_error(ArgumentError::Rejected { slot, error }));
        }
        logwise::trace_sync!(
            "{kernel}: slot {slot} bound ({size} bytes)",
            kernel = logwise::privacy::LogIt(&self.name),
            slot = slot,
            size = size
        );
        self.slots[slot as usize] = Some(BoundArg {
            slot,
            size,
            shared: value.shared,
        });
        Ok(())
    }

    /// Bound slots, in slot order.
    pub fn bound(&self) -> impl Iterator<Item = &BoundArg> {
        self.slots.iter().flatten()
    }

    /// Checks what a dispatch requires of the arguments: every slot bound, and every
    /// graphics-shared resource acquired.
    pub(crate) fn check_ready(&self) -> Result<(), Error> {
        for (slot, bound) in self.slots.iter().enumerate() {
            let slot = slot as u32;
            match bound {
                None => return Err(self.argument_error(ArgumentError::Unbound { slot })),
                Some(BoundArg {
                    shared: Some(ownership),
                    ..
                }) if !ownership.is_acquired() => {
                    return Err(Error::ProtocolViolation {
                        resource: "shared texture",
                        violation: crate::error::Violation::DispatchWhileUnshared { slot },
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Binds arguments to a kernel positionally.
///
/// ```ignore
/// bind_args!(kernel, image, result, 2.0f32)?;
/// ```
///
/// expands to `kernel.set_args(&[&image, &result, &2.0f32])`.
#[macro_export]
macro_rules! bind_args {
    ($kernel:expr $(, $arg:expr)* $(,)?) => {
        $kernel.set_args(&[$(&$arg as &dyn $crate::KernelArg),*])
    };
}

/// The kernels of one built program, in the order the runtime enumerated them.
#[derive(Debug)]
pub struct KernelRegistry {
    kernels: Vec<Kernel>,
}

impl KernelRegistry {
    pub(crate) fn new(kernels: Vec<Kernel>) -> Self {
        KernelRegistry { kernels }
    }

    fn not_found(&self, name: &str) -> Error {
        Error::KernelNotFound {
            name: name.to_string(),
            available: self.names().map(str::to_string).collect(),
        }
    }

    /// Looks up a kernel by exact name.
    pub fn get(&self, name: &str) -> Result<&Kernel, Error> {
        self.kernels
            .iter()
            .find(|k| k.name == name)
            .ok_or_else(|| self.not_found(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Kernel, Error> {
        match self.kernels.iter().position(|k| k.name == name) {
            Some(i) => Ok(&mut self.kernels[i]),
            None => Err(self.not_found(name)),
        }
    }

    /// Takes one kernel out, dropping the rest.
    pub fn into_kernel(mut self, name: &str) -> Result<Kernel, Error> {
        match self.kernels.iter().position(|k| k.name == name) {
            Some(i) => Ok(self.kernels.swap_remove(i)),
            None => Err(self.not_found(name)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kernels.iter().map(|k| k.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Kernel> {
        self.kernels.iter()
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

impl IntoIterator for KernelRegistry {
    type Item = Kernel;
    type IntoIter = std::vec::IntoIter<Kernel>;
    fn into_iter(self) -> Self::IntoIter {
        self.kernels.into_iter()
    }
}
