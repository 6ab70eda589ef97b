use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::compile::PALETTE_UNIFORM;
use crate::gpu::{
    GpuContext, ProgramTargets, ScreenQuad, ShaderProgram, UniformValue, WgpuTextureDevice,
};
use crate::texture::{GraphicsDevice, TextureManager, TextureUnitAllocator, UniformTarget};
use crate::types::{RendererConfig, TextureBinding};
use crate::view::{DragButton, FractalUniforms, FractalView};

/// Trackpads report pixels; this many count as one wheel notch.
const PIXELS_PER_SCROLL_LINE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Exit,
    ReloadTextures,
    ToggleOptionalTextures,
    ToggleMode,
    ToggleVsync,
    MoreIterations,
    FewerIterations,
}

fn action_for_key(key: &Key, repeat: bool) -> Option<Action> {
    match key {
        Key::Named(NamedKey::Escape) => Some(Action::Exit),
        Key::Named(NamedKey::ArrowUp) => Some(Action::MoreIterations),
        Key::Named(NamedKey::ArrowDown) => Some(Action::FewerIterations),
        Key::Character(text) if !repeat => match text.to_lowercase().as_str() {
            "r" => Some(Action::ReloadTextures),
            "p" => Some(Action::ToggleOptionalTextures),
            "m" => Some(Action::ToggleMode),
            "v" => Some(Action::ToggleVsync),
            _ => None,
        },
        _ => None,
    }
}

fn drag_button(button: MouseButton) -> Option<DragButton> {
    match button {
        MouseButton::Left => Some(DragButton::Pan),
        MouseButton::Right => Some(DragButton::Julia),
        _ => None,
    }
}

fn scroll_lines(delta: MouseScrollDelta) -> f64 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => f64::from(y),
        MouseScrollDelta::PixelDelta(position) => position.y / PIXELS_PER_SCROLL_LINE,
    }
}

/// Loads every configured texture. Required textures abort start-up.
fn load_textures<D: GraphicsDevice>(textures: &mut TextureManager<D>, bindings: &[TextureBinding]) {
    for binding in bindings {
        if binding.required {
            textures.must_load(&binding.name, &binding.path);
        } else if let Err(err) = textures.load(&binding.name, &binding.path) {
            warn!(texture = %binding.name, "skipping optional texture: {err}");
        }
    }
}

/// Re-reads every configured texture that is currently loaded; returns how
/// many succeeded.
fn reload_textures<D: GraphicsDevice>(
    textures: &mut TextureManager<D>,
    bindings: &[TextureBinding],
) -> usize {
    let mut reloaded = 0;
    for binding in bindings {
        if !textures.has(&binding.name) {
            continue;
        }
        match textures.reload(&binding.name, &binding.path) {
            Ok(_) => reloaded += 1,
            Err(err) => warn!(texture = %binding.name, "reload failed: {err}"),
        }
    }
    reloaded
}

/// Unloads optional textures that are present and loads those that are not.
fn toggle_optional_textures<D: GraphicsDevice>(
    textures: &mut TextureManager<D>,
    bindings: &[TextureBinding],
) {
    for binding in bindings.iter().filter(|binding| !binding.required) {
        if textures.has(&binding.name) {
            textures.unload(&binding.name);
            info!(texture = %binding.name, "unloaded texture");
        } else {
            match textures.load(&binding.name, &binding.path) {
                Ok(_) => info!(texture = %binding.name, "loaded texture"),
                Err(err) => warn!(texture = %binding.name, "could not load texture: {err}"),
            }
        }
    }
}

/// Binds each configured texture to a fresh unit and points its uniform at
/// it. Sampler-index uniforms without a loaded texture, including the bundled
/// shader's `palette`, get `-1` so shaders can fall back.
fn bind_textures<D: GraphicsDevice, P: UniformTarget>(
    textures: &mut TextureManager<D>,
    units: &mut TextureUnitAllocator,
    program: &mut P,
    bindings: &[TextureBinding],
) {
    units.reset();
    let mut claimed = HashSet::new();
    for binding in bindings {
        if let Ok(texture) = textures.find(&binding.name) {
            texture.bind_to_unit(units, program, &binding.uniform);
            claimed.insert(binding.uniform.as_str());
        }
    }

    let unclaimed = bindings
        .iter()
        .map(|binding| binding.uniform.as_str())
        .chain(std::iter::once(PALETTE_UNIFORM))
        .filter(|uniform| !claimed.contains(uniform));
    for uniform in unclaimed {
        if let Some(location) = program.uniform_location(uniform) {
            program.set_uniform_i32(location, -1);
        }
    }
}

fn write_view_uniforms(program: &mut ShaderProgram, uniforms: &FractalUniforms) {
    program.set_named("viewport", UniformValue::Vec4(uniforms.viewport));
    program.set_named("center", UniformValue::Vec2(uniforms.center));
    program.set_named("c", UniformValue::Vec2(uniforms.c));
    program.set_named("scale", UniformValue::Float(uniforms.scale));
    program.set_named("max_it", UniformValue::Int(uniforms.max_it));
    program.set_named("mode", UniformValue::Int(uniforms.mode));
}

/// Everything the viewer needs to draw one window.
///
/// GPU resources are declared before `window` so they drop first.
pub(crate) struct WindowState {
    textures: TextureManager<WgpuTextureDevice>,
    texture_device: Rc<RefCell<WgpuTextureDevice>>,
    units: TextureUnitAllocator,
    unit_bind_group: wgpu::BindGroup,
    unit_revision: u64,
    program: ShaderProgram,
    quad: ScreenQuad,
    context: GpuContext,
    window: Arc<Window>,
    view: FractalView,
    bindings: Vec<TextureBinding>,
    clear_color: wgpu::Color,
}

impl WindowState {
    pub(crate) fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let size = window.inner_size();
        let context = GpuContext::new(window.as_ref(), size, config.vsync)?;

        let texture_device = Rc::new(RefCell::new(WgpuTextureDevice::new(
            &context.device,
            &context.queue,
            &context.limits,
        )));
        let units = TextureUnitAllocator::from_device(&*texture_device.borrow());

        let program = {
            let device = texture_device.borrow();
            ShaderProgram::from_files(
                &context.device,
                config.vertex_shader.as_deref(),
                config.fragment_shader.as_deref(),
                &ProgramTargets {
                    surface_format: context.surface_format,
                    unit_layout: device.unit_layout(),
                    unit_count: device.unit_count(),
                },
            )?
        };

        let mut textures = TextureManager::new(Rc::clone(&texture_device));
        load_textures(&mut textures, &config.textures);
        info!(loaded = textures.len(), "textures ready");

        let unit_bind_group = texture_device.borrow().create_unit_bind_group();
        let unit_revision = texture_device.borrow().revision();
        let [r, g, b, a] = config.clear_color;

        Ok(Self {
            textures,
            texture_device,
            units,
            unit_bind_group,
            unit_revision,
            program,
            quad: ScreenQuad::new(&context.device),
            context,
            view: FractalView::new(&config.view, size.width, size.height),
            window,
            bindings: config.textures.clone(),
            clear_color: wgpu::Color { r, g, b, a },
        })
    }

    pub(crate) fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if self.context.resize(new_size) {
            self.view.resize(new_size.width, new_size.height);
        }
    }

    /// Returns `false` when the viewer should exit.
    fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::Exit => return false,
            Action::ReloadTextures => {
                let reloaded = reload_textures(&mut self.textures, &self.bindings);
                info!(reloaded, "reloaded textures");
            }
            Action::ToggleOptionalTextures => {
                toggle_optional_textures(&mut self.textures, &self.bindings);
            }
            Action::ToggleMode => {
                let mode = self.view.toggle_mode();
                info!(%mode, "switched fractal");
            }
            Action::ToggleVsync => {
                let enabled = !self.context.vsync();
                self.context.set_vsync(enabled);
                info!(vsync = self.context.vsync(), "toggled vsync");
            }
            Action::MoreIterations => {
                let max_iterations = self.view.increase_iterations();
                info!(max_iterations, "iterations");
            }
            Action::FewerIterations => {
                let max_iterations = self.view.decrease_iterations();
                info!(max_iterations, "iterations");
            }
        }
        true
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        bind_textures(
            &mut self.textures,
            &mut self.units,
            &mut self.program,
            &self.bindings,
        );
        write_view_uniforms(&mut self.program, &self.view.uniforms());
        self.program.flush(&self.context.queue);

        {
            let device = self.texture_device.borrow();
            if device.revision() != self.unit_revision {
                self.unit_bind_group = device.create_unit_bind_group();
                self.unit_revision = device.revision();
            }
        }

        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(self.program.pipeline());
            render_pass.set_bind_group(0, self.program.uniform_bind_group(), &[]);
            render_pass.set_bind_group(1, &self.unit_bind_group, &[]);
            self.quad.draw(&mut render_pass);
        }
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

/// Opens the viewer window and blocks until it is closed.
pub(crate) fn run(config: RendererConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(config.surface_size.0, config.surface_size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let mut state = WindowState::new(Arc::new(window), &config)
        .context("failed to initialise window renderer")?;

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state != ElementState::Pressed {
                            return;
                        }
                        if let Some(action) = action_for_key(&event.logical_key, event.repeat) {
                            if !state.apply(action) {
                                elwt.exit();
                            }
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        state.view.cursor_moved(position.x, position.y);
                    }
                    WindowEvent::MouseInput {
                        state: button_state,
                        button,
                        ..
                    } => {
                        if let Some(button) = drag_button(button) {
                            match button_state {
                                ElementState::Pressed => state.view.press(button),
                                ElementState::Released => state.view.release(button),
                            }
                        }
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        state.view.scroll(scroll_lines(delta));
                    }
                    WindowEvent::Resized(new_size) => state.resize(new_size),
                    WindowEvent::RedrawRequested => match state.render() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            state.context.reconfigure();
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            tracing::error!("surface out of memory; exiting");
                            elwt.exit();
                        }
                        Err(err) => {
                            warn!("surface error: {err:?}; retrying next frame");
                        }
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => state.window().request_redraw(),
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
