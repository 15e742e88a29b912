/// Semaphores, fences and submission descriptors

use std::any::Any;
use std::sync::Arc;
use bitflags::bitflags;
use crate::render::{CommandList, QueueKind};

bitflags! {
    /// Pipeline stages at which a semaphore wait applies
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const FRAGMENT_SHADER = 1 << 2;
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        const LATE_FRAGMENT_TESTS = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const COMPUTE_SHADER = 1 << 6;
        const TRANSFER = 1 << 7;
        const BOTTOM_OF_PIPE = 1 << 8;
        const ALL_COMMANDS = 1 << 9;
    }
}

/// Binary semaphore (GPU to GPU ordering)
pub trait Semaphore: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Fence (GPU to CPU completion signal)
pub trait Fence: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Semaphore wait of a submission
#[derive(Clone)]
pub struct SemaphoreWait {
    pub semaphore: Arc<dyn Semaphore>,
    /// Stages of the submitted work that wait
    pub stage: PipelineStageFlags,
}

/// One queue submission
///
/// An empty `command_lists` is valid: the submission still orders the
/// semaphores and signals the fence.
pub struct SubmitInfo<'a> {
    pub queue: QueueKind,
    pub command_lists: Vec<&'a dyn CommandList>,
    pub waits: Vec<SemaphoreWait>,
    pub signals: Vec<Arc<dyn Semaphore>>,
    pub fence: Option<Arc<dyn Fence>>,
}
