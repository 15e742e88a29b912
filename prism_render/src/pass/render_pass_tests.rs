use super::*;

// ============================================================================
// PassKind
// ============================================================================

#[test]
fn test_submit_groups() {
    assert_eq!(PassKind::EnvironmentPrecompute.submit_group(), SubmitGroup::Graphics);
    assert_eq!(PassKind::MeshPrecompute.submit_group(), SubmitGroup::Graphics);
    assert_eq!(PassKind::Shadow.submit_group(), SubmitGroup::Graphics);
    assert_eq!(PassKind::GBuffer.submit_group(), SubmitGroup::Graphics);
    assert_eq!(PassKind::OpaqueLighting.submit_group(), SubmitGroup::Graphics);
    assert_eq!(PassKind::Skybox.submit_group(), SubmitGroup::Graphics);
    assert_eq!(PassKind::DepthCompute.submit_group(), SubmitGroup::AsyncCompute);
    assert_eq!(PassKind::Ui.submit_group(), SubmitGroup::Present);
    assert_eq!(PassKind::Composite.submit_group(), SubmitGroup::Present);
}

#[test]
fn test_only_precompute_passes_are_one_time() {
    assert!(PassKind::EnvironmentPrecompute.is_one_time());
    assert!(PassKind::MeshPrecompute.is_one_time());
    assert!(!PassKind::Skybox.is_one_time());
    assert!(!PassKind::Composite.is_one_time());
}

#[test]
fn test_default_record_modes() {
    assert_eq!(PassKind::Ui.default_record_mode(), RecordMode::Dynamic);
    assert_eq!(PassKind::GBuffer.default_record_mode(), RecordMode::Dynamic);
    assert_eq!(PassKind::Skybox.default_record_mode(), RecordMode::Static);
    assert_eq!(PassKind::DepthCompute.default_record_mode(), RecordMode::Static);
}

#[test]
fn test_submit_groups_are_ordered() {
    assert!(SubmitGroup::Graphics < SubmitGroup::AsyncCompute);
    assert!(SubmitGroup::AsyncCompute < SubmitGroup::Present);
}

#[test]
fn test_headless_prepare_info_has_one_image() {
    let info = PrepareInfo {
        render_width: 64,
        render_height: 64,
        swapchain_images: &[],
        swapchain_format: TextureFormat::B8G8R8A8_SRGB,
        view_uniforms: &[],
        compute_queue: QueueKind::Graphics,
    };
    assert_eq!(info.image_count(), 1);
}
