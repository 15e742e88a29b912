/// Declared-but-unbound resource slots and allocation-time resources

use std::sync::Arc;
use crate::render::{AccelerationStructure, Buffer, Texture};

/// Where a declared parameter lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingHandle {
    pub set: u32,
    pub binding: u32,
}

/// A resource that may be provided after the parameter is declared
///
/// A descriptor set is only written once every slot of it is `Bound`.
#[derive(Clone)]
pub enum ResourceSlot<T> {
    Pending,
    Bound(T),
}

impl<T> ResourceSlot<T> {
    pub fn is_bound(&self) -> bool {
        matches!(self, ResourceSlot::Bound(_))
    }

    pub fn bound(&self) -> Option<&T> {
        match self {
            ResourceSlot::Bound(value) => Some(value),
            ResourceSlot::Pending => None,
        }
    }
}

impl<T> From<T> for ResourceSlot<T> {
    fn from(value: T) -> Self {
        ResourceSlot::Bound(value)
    }
}

/// Resource supplied to `allocate_descriptor_set_with`, one per declared
/// binding in declaration order
#[derive(Clone)]
pub enum BindingResource {
    Buffer(Arc<dyn Buffer>),
    Image(Arc<dyn Texture>),
    ImageArray(Vec<Arc<dyn Texture>>),
    AccelerationStructure(Arc<dyn AccelerationStructure>),
}

impl BindingResource {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            BindingResource::Buffer(_) => "buffer",
            BindingResource::Image(_) => "image",
            BindingResource::ImageArray(_) => "image array",
            BindingResource::AccelerationStructure(_) => "acceleration structure",
        }
    }
}
