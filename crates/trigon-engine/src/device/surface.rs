use winit::dpi::PhysicalSize;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    let first = caps.formats.first().copied()?;
    if !prefer_srgb {
        return Some(first);
    }
    Some(
        caps.formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .unwrap_or(first),
    )
}

/// Applies `new_size` to `config`. Returns `false` for a zero-area size,
/// which wgpu cannot configure; the caller skips reconfiguring until the
/// window is restored.
pub(crate) fn resize_config(
    config: &mut wgpu::SurfaceConfiguration,
    new_size: PhysicalSize<u32>,
) -> bool {
    if new_size.width == 0 || new_size.height == 0 {
        return false;
    }
    config.width = new_size.width;
    config.height = new_size.height;
    true
}

pub(crate) fn error_action(err: &wgpu::SurfaceError) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigured,
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}
