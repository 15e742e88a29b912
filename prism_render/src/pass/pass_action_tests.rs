//! Tests for the pass actions and RecordContext

use super::*;
use crate::parameters::ResourceSlot;
use crate::render::mock_graphics_device::{MockCommandList, MockGraphicsDevice};
use crate::render::{
    BufferDesc, BufferUsage, CommandBufferUsage, ComputePipelineDesc, DescriptorType,
    GraphicsPipelineDesc, ImageLayout, PipelineBindPoint, QueueKind, ShaderModuleDesc,
    ShaderStage, Texture, TextureDesc, TextureFormat, TextureUsage,
};
use crate::scene::{DrawItem, FrameDrawLists, MaterialClass, MaterialHandle, MeshHandle, TransformHandle};

const FRAME: FrameInfo = FrameInfo { frame_number: 7, image_index: 1 };

// ============================================================================
// Helpers
// ============================================================================

fn uniform(device: &MockGraphicsDevice) -> Arc<dyn Buffer> {
    device
        .create_buffer(&BufferDesc { size: 64, usage: BufferUsage::UNIFORM, host_visible: true })
        .unwrap()
}

fn texture(device: &MockGraphicsDevice, usage: TextureUsage) -> Arc<dyn Texture> {
    device
        .create_texture(&TextureDesc::new_2d(1280, 720, TextureFormat::R16G16B16A16_SFLOAT, usage))
        .unwrap()
}

/// Fullscreen lighting pass: one uniform at set 0, one color attachment
fn lighting_parameters(device: &MockGraphicsDevice, buffer: ResourceSlot<Arc<dyn Buffer>>) -> RenderPassParameters {
    let mut params = RenderPassParameters::new("lighting");
    params.add_parameter(buffer, DescriptorType::UniformBuffer, ShaderStageFlags::FRAGMENT, 0);
    params.add_attachment(
        &texture(device, TextureUsage::COLOR_ATTACHMENT),
        ImageLayout::Undefined,
        ImageLayout::ShaderReadOnly,
        true,
    );
    params.finalize(device).unwrap();
    params
}

fn graphics_pipeline(device: &MockGraphicsDevice, params: &RenderPassParameters) -> Arc<dyn Pipeline> {
    device
        .create_graphics_pipeline(&GraphicsPipelineDesc::fullscreen(
            params.name(),
            Arc::clone(params.pipeline_layout().unwrap()),
            Arc::clone(params.render_pass().unwrap()),
            ShaderModuleDesc::new(ShaderStage::Vertex, vec![]),
            ShaderModuleDesc::new(ShaderStage::Fragment, vec![]),
        ))
        .unwrap()
}

fn compute_setup(device: &MockGraphicsDevice) -> (RenderPassParameters, Arc<dyn Pipeline>) {
    let mut params = RenderPassParameters::new("ao");
    params.add_image_parameter(
        texture(device, TextureUsage::STORAGE),
        DescriptorType::StorageImage,
        ShaderStageFlags::COMPUTE,
        ImageLayout::General,
        None,
        0,
    );
    params.set_render_area(1280, 720);
    params.finalize(device).unwrap();
    let pipeline = device
        .create_compute_pipeline(&ComputePipelineDesc {
            name: "ao".to_string(),
            layout: Arc::clone(params.pipeline_layout().unwrap()),
            shader: ShaderModuleDesc::new(ShaderStage::Compute, vec![]),
        })
        .unwrap();
    (params, pipeline)
}

fn begin_list(device: &MockGraphicsDevice) -> Box<dyn CommandList> {
    let mut cmd = device.allocate_command_list(QueueKind::Graphics, CommandBufferUsage::Reusable).unwrap();
    cmd.begin().unwrap();
    cmd
}

fn commands(cmd: &dyn CommandList) -> Vec<String> {
    cmd.as_any().downcast_ref::<MockCommandList>().unwrap().commands.clone()
}

// ============================================================================
// Tests: FullscreenAction
// ============================================================================

#[test]
fn test_fullscreen_binds_sets_and_draws_triangle() {
    let device = MockGraphicsDevice::new();
    let params = lighting_parameters(&device, uniform(&device).into());
    let pipeline = graphics_pipeline(&device, &params);
    let scene = FrameDrawLists::new();
    let mut retained = Vec::new();
    let mut cmd = begin_list(&device);

    {
        let mut ctx = RecordContext::new(&device, &params, Some(&pipeline), FRAME, params.render_area(), &scene, None, &mut retained);
        FullscreenAction::new().execute(&mut ctx, cmd.as_mut()).unwrap();
        assert_eq!(ctx.skipped_allocations(), 0);
    }

    assert_eq!(
        commands(cmd.as_ref()),
        vec!["begin", "bind_pipeline(lighting)", "bind_descriptor_set(0)", "draw(3, 1)"]
    );
    assert_eq!(retained.len(), 1);
    assert_eq!(device.descriptor_update_count(), 1);
}

#[test]
fn test_fullscreen_skips_draw_while_resource_pending() {
    let device = MockGraphicsDevice::new();
    let params = lighting_parameters(&device, ResourceSlot::Pending);
    let pipeline = graphics_pipeline(&device, &params);
    let scene = FrameDrawLists::new();
    let mut retained = Vec::new();
    let mut cmd = begin_list(&device);

    {
        let mut ctx = RecordContext::new(&device, &params, Some(&pipeline), FRAME, params.render_area(), &scene, None, &mut retained);
        FullscreenAction::new().execute(&mut ctx, cmd.as_mut()).unwrap();
        assert_eq!(ctx.skipped_allocations(), 1);
    }

    assert_eq!(commands(cmd.as_ref()), vec!["begin", "bind_pipeline(lighting)"]);
    assert!(retained.is_empty());
    assert_eq!(device.descriptor_update_count(), 0);
}

#[test]
fn test_fullscreen_push_constants_precede_draw() {
    let device = MockGraphicsDevice::new();
    let params = lighting_parameters(&device, uniform(&device).into());
    let pipeline = graphics_pipeline(&device, &params);
    let scene = FrameDrawLists::new();
    let mut retained = Vec::new();
    let mut cmd = begin_list(&device);
    let exposure = [1.5f32, 0.0, 0.0, 0.0];

    {
        let mut ctx = RecordContext::new(&device, &params, Some(&pipeline), FRAME, params.render_area(), &scene, None, &mut retained);
        FullscreenAction::new()
            .with_push_constants(ShaderStageFlags::FRAGMENT, 0, &exposure)
            .execute(&mut ctx, cmd.as_mut())
            .unwrap();
    }

    let recorded = commands(cmd.as_ref());
    assert_eq!(recorded[3], "push_constants(offset=0, size=16)");
    assert_eq!(recorded[4], "draw(3, 1)");
}

#[test]
fn test_fullscreen_without_pipeline_fails() {
    let device = MockGraphicsDevice::new();
    let params = lighting_parameters(&device, uniform(&device).into());
    let scene = FrameDrawLists::new();
    let mut retained = Vec::new();
    let mut cmd = begin_list(&device);

    let mut ctx = RecordContext::new(&device, &params, None, FRAME, params.render_area(), &scene, None, &mut retained);
    assert!(FullscreenAction::new().execute(&mut ctx, cmd.as_mut()).is_err());
}

// ============================================================================
// Tests: DispatchAction
// ============================================================================

#[test]
fn test_dispatch_per_pixel_covers_render_area() {
    let device = MockGraphicsDevice::new();
    let (params, pipeline) = compute_setup(&device);
    let scene = FrameDrawLists::new();
    let mut retained = Vec::new();
    let mut cmd = begin_list(&device);

    {
        let mut ctx = RecordContext::new(&device, &params, Some(&pipeline), FRAME, params.render_area(), &scene, None, &mut retained);
        DispatchAction::per_pixel(8, 8).execute(&mut ctx, cmd.as_mut()).unwrap();
    }

    assert_eq!(
        commands(cmd.as_ref()),
        vec!["begin", "bind_pipeline(ao)", "bind_descriptor_set(0)", "dispatch(160, 90, 1)"]
    );
}

#[test]
fn test_dispatch_rounds_partial_groups_up() {
    let device = MockGraphicsDevice::new();
    let (params, pipeline) = compute_setup(&device);
    let scene = FrameDrawLists::new();
    let mut retained = Vec::new();
    let mut cmd = begin_list(&device);

    {
        let area = Rect2D::from_extent(100, 33);
        let mut ctx = RecordContext::new(&device, &params, Some(&pipeline), FRAME, area, &scene, None, &mut retained);
        DispatchAction::per_pixel(16, 16).execute(&mut ctx, cmd.as_mut()).unwrap();
    }

    assert_eq!(commands(cmd.as_ref()).last().unwrap(), "dispatch(7, 3, 1)");
}

#[test]
fn test_dispatch_fixed_group_count() {
    let device = MockGraphicsDevice::new();
    let (params, pipeline) = compute_setup(&device);
    let scene = FrameDrawLists::new();
    let mut retained = Vec::new();
    let mut cmd = begin_list(&device);

    {
        let mut ctx = RecordContext::new(&device, &params, Some(&pipeline), FRAME, params.render_area(), &scene, None, &mut retained);
        DispatchAction::new(4, 2, 1).execute(&mut ctx, cmd.as_mut()).unwrap();
    }

    assert_eq!(commands(cmd.as_ref()).last().unwrap(), "dispatch(4, 2, 1)");
}

#[test]
#[should_panic(expected = "workgroup size")]
fn test_dispatch_rejects_zero_workgroup() {
    DispatchAction::per_pixel(0, 8);
}

// ============================================================================
// Tests: CustomAction
// ============================================================================

#[test]
fn test_custom_action_walks_draw_lists() {
    let device = MockGraphicsDevice::new();
    let params = lighting_parameters(&device, ResourceSlot::Pending);
    let pipeline = graphics_pipeline(&device, &params);
    let mut scene = FrameDrawLists::new();
    scene.push(MaterialClass::Opaque, DrawItem::new(MeshHandle(3), MaterialHandle(1), TransformHandle(0)));
    scene.push(MaterialClass::Opaque, DrawItem::new(MeshHandle(4), MaterialHandle(1), TransformHandle(1)));
    scene.push(MaterialClass::Transparent, DrawItem::new(MeshHandle(5), MaterialHandle(2), TransformHandle(2)));
    let per_draw = uniform(&device);
    let mut retained = Vec::new();
    let mut cmd = begin_list(&device);

    let mut action = CustomAction::new(move |ctx, cmd| {
        assert_eq!(ctx.image_index(), 1);
        for item in ctx.scene().draw_list(MaterialClass::Opaque) {
            let resources = [BindingResource::Buffer(Arc::clone(&per_draw))];
            let Some(set) = ctx.allocate_descriptor_set_with(&resources, 0)? else {
                continue;
            };
            let layout = ctx.pipeline_layout().unwrap();
            cmd.bind_descriptor_set(layout, PipelineBindPoint::Graphics, 0, &set)?;
            cmd.draw(3, item.instance_count, 0, 0)?;
        }
        Ok(())
    });

    {
        let mut ctx = RecordContext::new(&device, &params, Some(&pipeline), FRAME, params.render_area(), &scene, None, &mut retained);
        action.execute(&mut ctx, cmd.as_mut()).unwrap();
    }

    assert_eq!(
        commands(cmd.as_ref()),
        vec!["begin", "bind_descriptor_set(0)", "draw(3, 1)", "bind_descriptor_set(0)", "draw(3, 1)"]
    );
    assert_eq!(retained.len(), 2);
}

#[test]
fn test_empty_custom_action_records_nothing() {
    let device = MockGraphicsDevice::new();
    let params = lighting_parameters(&device, ResourceSlot::Pending);
    let scene = FrameDrawLists::new();
    let mut retained = Vec::new();
    let mut cmd = begin_list(&device);

    {
        let mut ctx = RecordContext::new(&device, &params, None, FRAME, params.render_area(), &scene, None, &mut retained);
        CustomAction::empty().execute(&mut ctx, cmd.as_mut()).unwrap();
    }

    assert_eq!(commands(cmd.as_ref()), vec!["begin"]);
}
