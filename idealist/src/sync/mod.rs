//! Client synchronization
//!
//! Turns the change log into per-user instructions and incremental patches.

pub mod instruction;
pub mod patch;

pub use instruction::{
    derive_instruction, Action, EntityLookup, Instruction, InstructionObject, InstructionType,
    ItemView, ListSummary, ListView, Snapshot, SubscriptionView,
};
pub use patch::{build_patch, Patch, UserState};
