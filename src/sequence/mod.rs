//! Dispense sequencing on the board that holds bus mastership.

mod applicator;
mod registry;
mod sequencer;

pub use applicator::{NoApplicator, PasteApplicator, TableApplicator};
pub use registry::{SequenceRegistry, MAX_SEQUENCES};
pub use sequencer::{Axis, AxisRecord, SequenceReport, Sequencer};
