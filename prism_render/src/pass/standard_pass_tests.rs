//! Tests for StandardPass
//!
//! Lifecycle states, list allocation per record mode, re-preparation on
//! resize and descriptor set retention, against the mock device.

use super::*;
use std::sync::Mutex;
use crate::config::RenderConfig;
use crate::pass::{CustomAction, DispatchAction, FullscreenAction};
use crate::render::mock_graphics_device::{MockCommandList, MockGraphicsDevice};
use crate::render::{
    ComputePipelineDesc, DescriptorType, GraphicsPipelineDesc, ImageLayout, ShaderModuleDesc,
    ShaderStage, ShaderStageFlags, Swapchain, Texture, TextureFormat, TextureUsage,
};
use crate::resource::TargetSize;
use crate::scene::FrameDrawLists;

// ============================================================================
// Helpers
// ============================================================================

fn context(device: &Arc<MockGraphicsDevice>) -> RenderContext {
    RenderContext::new(device.clone(), RenderConfig::default().with_render_area(640, 360))
}

fn info<'a>(images: &'a [Arc<dyn Texture>], views: &'a [Arc<dyn Buffer>]) -> PrepareInfo<'a> {
    PrepareInfo {
        render_width: 640,
        render_height: 360,
        swapchain_images: images,
        swapchain_format: TextureFormat::B8G8R8A8_SRGB,
        view_uniforms: views,
        compute_queue: QueueKind::Compute,
    }
}

fn swapchain_images(device: &MockGraphicsDevice, count: usize) -> Vec<Arc<dyn Texture>> {
    let swapchain = device.create_swapchain(count, 640, 360);
    (0..count).map(|i| swapchain.image(i)).collect()
}

fn view_buffers(context: &RenderContext, count: usize) -> Vec<Arc<dyn Buffer>> {
    let mut resources = context.resources().unwrap();
    (0..count)
        .map(|i| resources.get_or_create_uniform_buffer(&format!("view_{}", i), 64 * (i as u64 + 1)).unwrap())
        .collect()
}

fn fullscreen_pipeline(ctx: &PipelineContext) -> Result<Arc<dyn Pipeline>> {
    let Some(render_pass) = ctx.render_pass else {
        engine_bail!("prism::test", "'{}' has no render pass", ctx.pass_name);
    };
    ctx.device.create_graphics_pipeline(&GraphicsPipelineDesc::fullscreen(
        ctx.pass_name,
        Arc::clone(ctx.layout),
        Arc::clone(render_pass),
        ShaderModuleDesc::new(ShaderStage::Vertex, vec![]),
        ShaderModuleDesc::new(ShaderStage::Fragment, vec![]),
    ))
}

fn compute_pipeline(ctx: &PipelineContext) -> Result<Arc<dyn Pipeline>> {
    ctx.device.create_compute_pipeline(&ComputePipelineDesc {
        name: ctx.pass_name.to_string(),
        layout: Arc::clone(ctx.layout),
        shader: ShaderModuleDesc::new(ShaderStage::Compute, vec![]),
    })
}

/// Skybox into the HDR target: one uniform, one color attachment
fn skybox_setup(params: &mut RenderPassParameters, context: &RenderContext, _info: &PrepareInfo) -> Result<()> {
    let mut resources = context.resources()?;
    let target = resources.get_or_create_color_target("hdr", TargetSize::RenderArea, TextureFormat::R16G16B16A16_SFLOAT)?;
    let sky = resources.get_or_create_uniform_buffer("sky", 64)?;
    params.add_parameter(sky, DescriptorType::UniformBuffer, ShaderStageFlags::FRAGMENT, 0);
    params.add_attachment(&target, ImageLayout::ShaderReadOnly, ImageLayout::ShaderReadOnly, false);
    Ok(())
}

/// Composite onto the swapchain images
fn composite_setup(params: &mut RenderPassParameters, _context: &RenderContext, info: &PrepareInfo) -> Result<()> {
    params.add_swapchain_attachment(
        info.swapchain_images.to_vec(),
        ImageLayout::Undefined,
        ImageLayout::PresentSrc,
        true,
    );
    Ok(())
}

fn skybox_pass() -> StandardPass {
    StandardPass::new(PassDesc::new("skybox", PassKind::Skybox), skybox_setup, FullscreenAction::new())
        .with_pipeline(fullscreen_pipeline)
}

fn commands(list: &dyn CommandList) -> Vec<String> {
    list.as_any().downcast_ref::<MockCommandList>().unwrap().commands.clone()
}

fn ready(pass: &mut StandardPass, context: &RenderContext, info: &PrepareInfo) {
    pass.prepare_render_pass(context, info).unwrap();
    pass.create_pipeline(context).unwrap();
}

const FIRST_FRAME: FrameInfo = FrameInfo { frame_number: 0, image_index: 0 };

// ============================================================================
// Tests: lifecycle
// ============================================================================

#[test]
fn test_lifecycle_states() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let mut pass = skybox_pass();
    assert_eq!(pass.state(), PassState::Uninitialized);

    pass.prepare_render_pass(&context, &info(&[], &[])).unwrap();
    assert_eq!(pass.state(), PassState::Prepared);
    assert!(pass.parameters().is_finalized());

    pass.create_pipeline(&context).unwrap();
    assert_eq!(pass.state(), PassState::PipelineCreated);
    assert!(pass.pipeline().is_some());

    pass.record_command_buffers(&context, &FIRST_FRAME, &FrameDrawLists::new()).unwrap();
    assert_eq!(pass.state(), PassState::Recorded);

    pass.destroy();
    assert_eq!(pass.state(), PassState::Destroyed);
    assert!(pass.command_list(0).is_none());
    for kind in ["render_pass", "framebuffer", "pipeline", "pipeline_layout", "command_list", "descriptor_set"] {
        assert_eq!(device.live_count(kind), 0, "{} still alive", kind);
    }
}

#[test]
#[should_panic(expected = "requires a prepared pass")]
fn test_create_pipeline_before_prepare_panics() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    skybox_pass().create_pipeline(&context).unwrap();
}

#[test]
#[should_panic(expected = "record_command_buffers in state Prepared")]
fn test_record_before_pipeline_panics() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let mut pass = skybox_pass();
    pass.prepare_render_pass(&context, &info(&[], &[])).unwrap();
    pass.record_command_buffers(&context, &FIRST_FRAME, &FrameDrawLists::new()).unwrap();
}

#[test]
fn test_setup_error_leaves_pass_uninitialized() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let mut pass = StandardPass::new(
        PassDesc::new("broken", PassKind::OpaqueLighting),
        |_params: &mut RenderPassParameters, _context: &RenderContext, _info: &PrepareInfo| -> Result<()> {
            engine_bail!("prism::test", "missing input");
        },
        CustomAction::empty(),
    );

    assert!(pass.prepare_render_pass(&context, &info(&[], &[])).is_err());
    assert_eq!(pass.state(), PassState::Uninitialized);
    assert_eq!(pass.command_list_count(), 0);
}

// ============================================================================
// Tests: recording
// ============================================================================

#[test]
fn test_static_pass_records_single_list() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let images = swapchain_images(&device, 3);
    let mut pass = skybox_pass();
    ready(&mut pass, &context, &info(&images, &[]));

    pass.record_command_buffers(&context, &FIRST_FRAME, &FrameDrawLists::new()).unwrap();

    assert_eq!(pass.command_list_count(), 1);
    assert!(!pass.touches_swapchain());
    let recorded = commands(pass.command_list(2).unwrap());
    assert_eq!(recorded[0], "begin");
    assert!(recorded[1].starts_with("begin_render_pass("));
    assert!(recorded[1].ends_with("640x360, clears=1)"));
    assert_eq!(
        recorded[2..],
        ["set_viewport(640x360)", "set_scissor(640x360)", "bind_pipeline(skybox)", "bind_descriptor_set(0)", "draw(3, 1)", "end_render_pass", "end"]
    );
    assert_eq!(pass.command_list(0).unwrap().usage(), CommandBufferUsage::Static);
}

#[test]
fn test_swapchain_pass_records_one_list_per_image() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let images = swapchain_images(&device, 3);
    let mut pass = StandardPass::new(PassDesc::new("composite", PassKind::Composite), composite_setup, CustomAction::empty());
    ready(&mut pass, &context, &info(&images, &[]));

    pass.record_command_buffers(&context, &FIRST_FRAME, &FrameDrawLists::new()).unwrap();

    assert!(pass.touches_swapchain());
    assert_eq!(pass.command_list_count(), 3);
    assert_eq!(pass.parameters().framebuffer_count(), 3);
    let first_pass: Vec<String> = (0..3).map(|i| commands(pass.command_list(i).unwrap())[1].clone()).collect();
    assert_ne!(first_pass[0], first_pass[1]);
    assert_ne!(first_pass[1], first_pass[2]);
    assert_eq!(pass.record_count(), 3);
}

#[test]
fn test_dynamic_pass_records_current_image_only() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let images = swapchain_images(&device, 3);
    let views = view_buffers(&context, 3);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_action = Arc::clone(&seen);
    let mut pass = StandardPass::new(
        PassDesc::new("ui", PassKind::Ui),
        composite_setup,
        CustomAction::new(move |ctx, _cmd| {
            let size = ctx.view_uniforms().map(|b| b.size()).unwrap_or(0);
            seen_in_action.lock().unwrap().push((ctx.image_index(), size));
            Ok(())
        }),
    );
    ready(&mut pass, &context, &info(&images, &views));

    let frame = FrameInfo { frame_number: 4, image_index: 1 };
    pass.record_command_buffers(&context, &frame, &FrameDrawLists::new()).unwrap();

    assert_eq!(pass.record_mode(), RecordMode::Dynamic);
    assert!(pass.command_list(0).is_none());
    assert!(pass.command_list(1).is_some());
    assert!(pass.command_list(2).is_none());
    assert_eq!(pass.command_list(1).unwrap().usage(), CommandBufferUsage::Reusable);
    assert_eq!(*seen.lock().unwrap(), vec![(1, 128)]);
}

#[test]
fn test_rerecord_releases_previous_sets() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let images = swapchain_images(&device, 2);
    let mut pass = StandardPass::new(
        PassDesc::new("skybox", PassKind::Skybox).with_record_mode(RecordMode::Dynamic),
        skybox_setup,
        FullscreenAction::new(),
    )
    .with_pipeline(fullscreen_pipeline);
    ready(&mut pass, &context, &info(&images, &[]));

    let scene = FrameDrawLists::new();
    for frame_number in 0..4 {
        let frame = FrameInfo { frame_number, image_index: 0 };
        pass.record_command_buffers(&context, &frame, &scene).unwrap();
    }

    assert_eq!(pass.retained_set_count(0), 1);
    assert_eq!(pass.retained_set_count(1), 0);
    assert_eq!(device.live_count("descriptor_set"), 1);
    assert_eq!(device.created_count("descriptor_set"), 4);
}

#[test]
fn test_compute_pass_uses_compute_queue_and_prepare_extent() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let mut pass = StandardPass::new(
        PassDesc::new("ao", PassKind::DepthCompute),
        |params: &mut RenderPassParameters, context: &RenderContext, _info: &PrepareInfo| -> Result<()> {
            let depth = context
                .resources()?
                .get_or_create_depth_target("depth", TargetSize::RenderArea, TextureFormat::D32_SFLOAT)?;
            params.add_image_parameter(
                depth,
                DescriptorType::CombinedImageSampler,
                ShaderStageFlags::COMPUTE,
                ImageLayout::DepthStencilReadOnly,
                Some(crate::render::SamplerType::NearestClamp),
                0,
            );
            Ok(())
        },
        DispatchAction::per_pixel(8, 8),
    )
    .with_pipeline(compute_pipeline);
    ready(&mut pass, &context, &info(&[], &[]));

    pass.record_command_buffers(&context, &FIRST_FRAME, &FrameDrawLists::new()).unwrap();

    assert_eq!(pass.submit_group(), SubmitGroup::AsyncCompute);
    assert_eq!(pass.queue(), QueueKind::Compute);
    let list = pass.command_list(0).unwrap();
    assert_eq!(list.queue(), QueueKind::Compute);
    assert_eq!(commands(list).last().unwrap(), "end");
    assert!(commands(list).contains(&"dispatch(80, 45, 1)".to_string()));
}

#[test]
fn test_one_time_pass_uses_immediate_lists() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let mut pass = StandardPass::new(
        PassDesc::new("irradiance", PassKind::EnvironmentPrecompute),
        |params: &mut RenderPassParameters, context: &RenderContext, _info: &PrepareInfo| -> Result<()> {
            let cube = context.resources()?.get_or_create_texture(
                "irradiance",
                &crate::render::TextureDesc::new_cube(32, TextureFormat::R16G16B16A16_SFLOAT, TextureUsage::STORAGE),
            )?;
            params.add_image_parameter(cube, DescriptorType::StorageImage, ShaderStageFlags::COMPUTE, ImageLayout::General, None, 0);
            params.set_render_area(32, 32);
            Ok(())
        },
        DispatchAction::per_pixel(8, 8),
    )
    .with_pipeline(compute_pipeline);
    ready(&mut pass, &context, &info(&[], &[]));
    pass.record_command_buffers(&context, &FIRST_FRAME, &FrameDrawLists::new()).unwrap();

    let list = pass.command_list(0).unwrap();
    assert_eq!(list.usage(), CommandBufferUsage::Immediate);
    assert_eq!(list.queue(), QueueKind::Graphics);
    assert!(commands(list).contains(&"dispatch(4, 4, 1)".to_string()));
}

// ============================================================================
// Tests: re-preparation (resize)
// ============================================================================

#[test]
fn test_reprepare_destroys_before_recreating() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let live_during_setup = Arc::new(Mutex::new(Vec::new()));
    let probe = Arc::clone(&live_during_setup);
    let mut pass = StandardPass::new(
        PassDesc::new("skybox", PassKind::Skybox),
        move |params: &mut RenderPassParameters, context: &RenderContext, info: &PrepareInfo| -> Result<()> {
            if let Some(mock) = context.device().as_any().downcast_ref::<MockGraphicsDevice>() {
                probe.lock().unwrap().push((
                    mock.live_count("render_pass"),
                    mock.live_count("framebuffer"),
                    mock.live_count("pipeline"),
                ));
            }
            skybox_setup(params, context, info)
        },
        FullscreenAction::new(),
    )
    .with_pipeline(fullscreen_pipeline);

    ready(&mut pass, &context, &info(&[], &[]));
    pass.record_command_buffers(&context, &FIRST_FRAME, &FrameDrawLists::new()).unwrap();

    context.resources().unwrap().resize_render_targets(320, 180).unwrap();
    ready(&mut pass, &context, &info(&[], &[]));
    pass.record_command_buffers(&context, &FIRST_FRAME, &FrameDrawLists::new()).unwrap();

    assert_eq!(*live_during_setup.lock().unwrap(), vec![(0, 0, 0), (0, 0, 0)]);
    assert_eq!(device.live_count("render_pass"), 1);
    assert_eq!(device.live_count("framebuffer"), 1);
    assert_eq!(device.live_count("pipeline"), 1);
    assert_eq!(device.live_count("command_list"), 1);
    assert_eq!(device.created_count("render_pass"), 2);
    assert!(commands(pass.command_list(0).unwrap())[1].ends_with("320x180, clears=1)"));
}

#[test]
fn test_destroyed_pass_can_be_prepared_again() {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = context(&device);
    let mut pass = skybox_pass();
    ready(&mut pass, &context, &info(&[], &[]));
    pass.destroy();

    ready(&mut pass, &context, &info(&[], &[]));
    assert_eq!(pass.state(), PassState::PipelineCreated);
    assert_eq!(device.live_count("render_pass"), 1);
}
