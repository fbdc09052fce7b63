use egui::epaint::Shadow;

use super::widgets::{DebugMessages, PlayerWidget};

pub struct HudStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub entity_count: usize,
    pub resolution: (u32, u32),
    pub player_position: (f32, f32, f32),
    /// "Idle" or "Inspecting <name>".
    pub inspect_mode: String,
    /// Name of the object under the crosshair, if any.
    pub candidate: Option<String>,
}

pub struct Hud {
    pub stats_visible: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Hud {
    pub fn new(
        window: &winit::window::Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        // Style: dark, semi-transparent, small monospace white font
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);
        visuals.window_stroke = egui::Stroke::NONE;
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(egui::Color32::WHITE);
        egui_ctx.set_visuals(visuals);

        let mut style = (*egui_ctx.style()).clone();
        style.override_font_id = Some(egui::FontId::monospace(13.0));
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface_format,
            None,  // HUD draws on top, no depth test
            1,     // msaa samples
            false, // no dithering
        );

        Self {
            stats_visible: false,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn toggle_stats(&mut self) {
        self.stats_visible = !self.stats_visible;
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) {
        // The overlay is display-only, so egui never consumes the event.
        let _ = self.egui_state.on_window_event(window, event);
    }

    /// Render one egui frame: crosshair, prompt, debug messages and (F3) stats.
    /// Draws with LoadOp::Load over the already rendered scene.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        widget: &PlayerWidget,
        messages: &DebugMessages,
        stats: Option<&HudStats>,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);
        let stats = stats.filter(|_| self.stats_visible);

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            // ── crosshair ────────────────────────────────────────────────────
            let centre = ctx.screen_rect().center();
            let painter = ctx.layer_painter(egui::LayerId::new(
                egui::Order::Foreground,
                egui::Id::new("crosshair"),
            ));
            painter.circle_filled(centre, 2.5, egui::Color32::from_rgba_unmultiplied(255, 255, 255, 220));

            // ── interaction prompt ───────────────────────────────────────────
            if widget.prompt_visible {
                egui::Area::new(egui::Id::new("inspect_prompt"))
                    .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 48.0))
                    .show(ctx, |ui| {
                        egui::Frame::none()
                            .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 160))
                            .inner_margin(egui::Margin::same(6.0))
                            .rounding(4.0)
                            .show(ui, |ui: &mut egui::Ui| {
                                ui.label(&widget.prompt_text);
                            });
                    });
            }

            // ── on-screen debug messages ─────────────────────────────────────
            if !messages.is_empty() {
                let top = if stats.is_some() { 150.0 } else { 10.0 };
                egui::Area::new(egui::Id::new("debug_messages"))
                    .fixed_pos(egui::pos2(10.0, top))
                    .show(ctx, |ui| {
                        for message in messages.iter() {
                            let [r, g, b, _] = message.color.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8);
                            ui.colored_label(egui::Color32::from_rgb(r, g, b), &message.text);
                        }
                    });
            }

            // ── F3: stats panel ──────────────────────────────────────────────
            if let Some(stats) = stats {
                egui::Area::new(egui::Id::new("hud_stats"))
                    .fixed_pos(egui::pos2(10.0, 10.0))
                    .show(ctx, |ui| {
                        egui::Frame::none()
                            .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 180))
                            .inner_margin(egui::Margin::same(8.0))
                            .rounding(4.0)
                            .show(ui, |ui: &mut egui::Ui| {
                                ui.label(format!("FPS: {}", stats.fps));
                                ui.label(format!("Frame: {:.2} ms", stats.frame_time_avg_ms));
                                ui.label(format!("Entities: {}", stats.entity_count));
                                ui.label(format!(
                                    "Resolution: {} x {}",
                                    stats.resolution.0, stats.resolution.1
                                ));
                                ui.label(format!(
                                    "Player: ({:.1}, {:.1}, {:.1})",
                                    stats.player_position.0, stats.player_position.1, stats.player_position.2
                                ));
                                ui.label(format!("Mode: {}", stats.inspect_mode));
                                ui.label(format!(
                                    "Candidate: {}",
                                    stats.candidate.as_deref().unwrap_or("-")
                                ));
                            });
                    });
            }
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer
                .render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}
