//! Pan/zoom state of the fractal view, independent of any window system.

use crate::types::{FractalMode, ViewOptions};

/// Scroll steps needed to double or halve the scale.
const ZOOM_STEPS_PER_OCTAVE: f64 = 10.0;
const INITIAL_ZOOM_OFFSET: f64 = -10.0;
/// Pixels of right-drag that move `c` by one scale unit.
const JULIA_DRAG_DIVISOR: f64 = 400.0;

/// Largest square centred in the window, in window pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareViewport {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl SquareViewport {
    /// The square is as large as the longer window side, so the shorter side
    /// crops the fractal rather than letterboxing it.
    pub fn fit(width: u32, height: u32) -> Self {
        let size = width.max(height).max(1);
        Self {
            x: (i64::from(width) - i64::from(size)) as f32 / 2.0,
            y: (i64::from(height) - i64::from(size)) as f32 / 2.0,
            size: size as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragButton {
    /// Moves the view centre.
    Pan,
    /// Moves the Julia constant `c`.
    Julia,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Pan { start: (f64, f64), center: (f64, f64) },
    Julia { start: (f64, f64), c: (f64, f64) },
}

impl Drag {
    fn button(&self) -> DragButton {
        match self {
            Drag::Pan { .. } => DragButton::Pan,
            Drag::Julia { .. } => DragButton::Julia,
        }
    }
}

/// Values the view writes into the shader's uniform block every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalUniforms {
    pub viewport: [f32; 4],
    pub center: [f32; 2],
    pub c: [f32; 2],
    pub scale: f32,
    pub max_it: i32,
    pub mode: i32,
}

#[derive(Debug, Clone)]
pub struct FractalView {
    center: (f64, f64),
    zoom_offset: f64,
    c: (f64, f64),
    max_iterations: i32,
    mode: FractalMode,
    viewport: SquareViewport,
    cursor: (f64, f64),
    drag: Option<Drag>,
}

impl FractalView {
    pub fn new(options: &ViewOptions, width: u32, height: u32) -> Self {
        Self {
            center: (0.0, 0.0),
            zoom_offset: INITIAL_ZOOM_OFFSET,
            c: (options.julia[0], options.julia[1]),
            max_iterations: options.max_iterations.max(1),
            mode: options.mode,
            viewport: SquareViewport::fit(width, height),
            cursor: (0.0, 0.0),
            drag: None,
        }
    }

    /// Complex-plane distance from the centre to the edge of the square.
    pub fn scale(&self) -> f64 {
        2f64.powf(-self.zoom_offset / ZOOM_STEPS_PER_OCTAVE)
    }

    /// View centre in viewport pixels scaled by the current zoom.
    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn julia(&self) -> (f64, f64) {
        self.c
    }

    pub fn max_iterations(&self) -> i32 {
        self.max_iterations
    }

    pub fn mode(&self) -> FractalMode {
        self.mode
    }

    pub fn viewport(&self) -> SquareViewport {
        self.viewport
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = SquareViewport::fit(width, height);
    }

    /// Tracks the cursor and applies any active drag.
    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        self.cursor = (x, y);
        let scale = self.scale();
        match self.drag {
            Some(Drag::Pan { start, center }) => {
                self.center = (
                    center.0 - (x - start.0) * scale,
                    center.1 + (y - start.1) * scale,
                );
            }
            Some(Drag::Julia { start, c }) => {
                self.c = (
                    c.0 - (x - start.0) / JULIA_DRAG_DIVISOR * scale,
                    c.1 + (y - start.1) / JULIA_DRAG_DIVISOR * scale,
                );
            }
            None => {}
        }
    }

    /// Starts a drag from the current cursor position. Ignored while another
    /// drag is in progress.
    pub fn press(&mut self, button: DragButton) {
        if self.drag.is_some() {
            return;
        }
        let start = self.cursor;
        self.drag = Some(match button {
            DragButton::Pan => Drag::Pan {
                start,
                center: self.center,
            },
            DragButton::Julia => Drag::Julia { start, c: self.c },
        });
    }

    pub fn release(&mut self, button: DragButton) {
        if self.drag.is_some_and(|drag| drag.button() == button) {
            self.drag = None;
        }
    }

    /// Positive `lines` zoom in.
    pub fn scroll(&mut self, lines: f64) {
        self.zoom_offset += lines;
    }

    pub fn increase_iterations(&mut self) -> i32 {
        self.max_iterations = self.max_iterations.saturating_add(1);
        self.max_iterations
    }

    pub fn decrease_iterations(&mut self) -> i32 {
        self.max_iterations = (self.max_iterations - 1).max(1);
        self.max_iterations
    }

    pub fn toggle_mode(&mut self) -> FractalMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    pub fn uniforms(&self) -> FractalUniforms {
        let viewport = self.viewport;
        let size = f64::from(viewport.size);
        FractalUniforms {
            viewport: [viewport.x, viewport.y, viewport.size, 0.0],
            center: [
                (self.center.0 / size * 2.0) as f32,
                (self.center.1 / size * 2.0) as f32,
            ],
            c: [self.c.0 as f32, self.c.1 as f32],
            scale: self.scale() as f32,
            max_it: self.max_iterations,
            mode: self.mode.as_uniform(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> FractalView {
        FractalView::new(&ViewOptions::default(), 600, 600)
    }

    #[test]
    fn starts_at_scale_two_with_default_parameters() {
        let view = view();
        assert_eq!(view.scale(), 2.0);
        assert_eq!(view.center(), (0.0, 0.0));
        assert_eq!(view.julia(), (0.0, 0.0));
        assert_eq!(view.max_iterations(), 10);
        assert_eq!(view.mode(), FractalMode::Julia);
    }

    #[test]
    fn ten_scroll_steps_halve_the_scale() {
        let mut view = view();
        for _ in 0..10 {
            view.scroll(1.0);
        }
        assert!((view.scale() - 1.0).abs() < 1e-12);
        view.scroll(-20.0);
        assert!((view.scale() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn pan_drag_moves_the_center_against_the_cursor() {
        let mut view = view();
        view.cursor_moved(100.0, 100.0);
        view.press(DragButton::Pan);
        view.cursor_moved(110.0, 90.0);

        assert_eq!(view.center(), (-20.0, -20.0));
        view.release(DragButton::Pan);
        view.cursor_moved(500.0, 500.0);
        assert_eq!(view.center(), (-20.0, -20.0));
    }

    #[test]
    fn julia_drag_moves_c_slowly() {
        let mut view = view();
        view.press(DragButton::Julia);
        view.cursor_moved(40.0, -20.0);

        let (re, im) = view.julia();
        assert!((re + 0.2).abs() < 1e-12);
        assert!((im + 0.1).abs() < 1e-12);
    }

    #[test]
    fn only_one_drag_runs_at_a_time() {
        let mut view = view();
        view.press(DragButton::Pan);
        view.press(DragButton::Julia);
        view.release(DragButton::Julia);
        assert!(view.is_dragging());

        view.cursor_moved(10.0, 0.0);
        assert_eq!(view.julia(), (0.0, 0.0));
        assert_eq!(view.center(), (-20.0, 0.0));
    }

    #[test]
    fn iterations_never_drop_below_one() {
        let mut view = view();
        assert_eq!(view.increase_iterations(), 11);
        for _ in 0..20 {
            view.decrease_iterations();
        }
        assert_eq!(view.max_iterations(), 1);
    }

    #[test]
    fn viewport_is_a_centered_square_of_the_longer_side() {
        assert_eq!(
            SquareViewport::fit(800, 600),
            SquareViewport {
                x: 0.0,
                y: -100.0,
                size: 800.0
            }
        );
        assert_eq!(
            SquareViewport::fit(300, 500),
            SquareViewport {
                x: -100.0,
                y: 0.0,
                size: 500.0
            }
        );
    }

    #[test]
    fn uniforms_normalise_the_center_by_the_viewport() {
        let mut view = FractalView::new(&ViewOptions::default(), 400, 200);
        view.press(DragButton::Pan);
        view.cursor_moved(-50.0, 0.0);
        let toggled = view.toggle_mode();

        let uniforms = view.uniforms();
        assert_eq!(uniforms.viewport, [0.0, -100.0, 400.0, 0.0]);
        assert_eq!(uniforms.center, [0.5, 0.0]);
        assert_eq!(uniforms.scale, 2.0);
        assert_eq!(uniforms.max_it, 10);
        assert_eq!(toggled, FractalMode::Mandelbrot);
        assert_eq!(uniforms.mode, 1);
    }
}
