//! Live Z-machine state shared between the interpreter and the snapshot codec.
//!
//! [`ZMachine`] owns the story memory (with its mutable dynamic prefix), a
//! pristine reference image of the dynamic region, and the fixed-capacity
//! evaluation stack together with the frame-pointer bookkeeping that routine
//! calls maintain. The snapshot codec reads this state when saving and mutates
//! it in place when restoring; the instruction interpreter is an external
//! consumer of the same surface.

#![forbid(unsafe_code)]

mod machine;
mod story;

pub use crate::machine::{CallKind, MachineError, ZMachine, DEFAULT_STACK_SIZE};
pub use crate::story::{
    StoryIdentity, ZVersion, HEADER_SIZE, H_CHECKSUM, H_INITIAL_PC, H_RELEASE, H_SERIAL,
    H_STATIC_BASE, H_VERSION,
};
