pub mod category;
pub mod view;
pub mod wire;

pub use category::{CategoryFilter, FileKind};
pub use view::{row_status, task_row_status, RowStatus};
pub use wire::{ControlAck, StreamEnvelope, TaskControlAction, TaskKey, TransferTask};
