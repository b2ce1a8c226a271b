//! VM execution state flags.

use bitflags::bitflags;

bitflags! {
    /// Indicates the status of the virtual machine.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct VMState: u8 {
        /// Execution is in progress.
        const NONE = 0;
        /// Execution completed successfully.
        const HALT = 1 << 0;
        /// Execution terminated with an unhandled fault.
        const FAULT = 1 << 1;
        /// Execution is paused between steps.
        const BREAK = 1 << 2;
    }
}

impl VMState {
    /// Returns `true` when the VM has halted successfully.
    pub fn is_halt(self) -> bool {
        self.contains(VMState::HALT)
    }

    /// Returns `true` when the VM faulted.
    pub fn is_fault(self) -> bool {
        self.contains(VMState::FAULT)
    }

    /// Returns `true` when the VM is paused between steps.
    pub fn is_break(self) -> bool {
        self.contains(VMState::BREAK)
    }

    /// Returns `true` for HALT and FAULT, the states execution cannot
    /// leave.
    pub fn is_terminal(self) -> bool {
        self.intersects(VMState::HALT | VMState::FAULT)
    }
}
