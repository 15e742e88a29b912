pub mod resource_slot;
pub mod render_pass_parameters;

pub use resource_slot::{BindingHandle, BindingResource, ResourceSlot};
pub use render_pass_parameters::{DescriptorSetAllocation, RenderPassParameters};
