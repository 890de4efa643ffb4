use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use eframe::egui;

use crate::config::KeyBindings;
use crate::error::{AnnotateError, Result};
use crate::geometry::{BBox, Point};
use crate::render::{COMMITTED_COLOR, DRAFT_COLOR};
use crate::session::{Command, Event, EventSource, Scene, Surface};

// ── Engine side ─────────────────────────────────────────────────────────────

pub enum UiMessage {
    Scene(Scene),
    Finished,
}

/// Events forwarded from the window. A closed window reads as Quit.
pub struct ChannelEvents {
    rx: Receiver<Event>,
}

impl EventSource for ChannelEvents {
    fn next_event(&mut self) -> Event {
        self.rx.recv().unwrap_or(Event::Command(Command::Quit))
    }
}

pub struct ChannelSurface {
    tx: Sender<UiMessage>,
    ctx: egui::Context,
}

impl ChannelSurface {
    fn finish(&self) {
        let _ = self.tx.send(UiMessage::Finished);
        self.ctx.request_repaint();
    }
}

impl Surface for ChannelSurface {
    fn present(&mut self, scene: Scene) {
        // a dropped receiver means the window is gone; Quit follows
        let _ = self.tx.send(UiMessage::Scene(scene));
        self.ctx.request_repaint();
    }
}

// ── Key bindings ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct Keymap {
    undo: egui::Key,
    save: egui::Key,
    quit: egui::Key,
}

impl Keymap {
    pub fn resolve(bindings: &KeyBindings) -> Result<Self> {
        let key = |name: &str| {
            egui::Key::from_name(name)
                .ok_or_else(|| AnnotateError::Config(format!("unknown key name {name:?}")))
        };
        Ok(Self {
            undo: key(&bindings.undo)?,
            save: key(&bindings.save)?,
            quit: key(&bindings.quit)?,
        })
    }

    fn command(&self, key: egui::Key) -> Option<Command> {
        if key == self.undo {
            Some(Command::Undo)
        } else if key == self.save {
            Some(Command::Save)
        } else if key == self.quit {
            Some(Command::Quit)
        } else {
            None
        }
    }

    /// Maps one key press to the event the engine sees. Auto-repeat of a
    /// held Save or Quit key is dropped so one press saves or quits once.
    fn event_for(&self, key: egui::Key, repeat: bool) -> Option<Event> {
        match self.command(key) {
            Some(Command::Save | Command::Quit) if repeat => None,
            Some(cmd) => Some(Event::Command(cmd)),
            None => Some(Event::Other),
        }
    }

    fn help(&self) -> String {
        format!(
            "drag: draw box   {}: undo   {}: save & next   {}: quit",
            self.undo.name(),
            self.save.name(),
            self.quit.name()
        )
    }
}

// ── App ─────────────────────────────────────────────────────────────────────

struct AnnotateApp {
    events: Option<Sender<Event>>,
    updates: Receiver<UiMessage>,
    keys: Keymap,

    scene: Option<Scene>,
    texture: Option<egui::TextureHandle>,
    fit_pending: bool,

    // last pointer position sent while dragging
    last_sent: Option<Point>,

    // pan & zoom
    pan: egui::Vec2,
    zoom: f32,
    panning: bool,
}

impl AnnotateApp {
    fn new(events: Sender<Event>, updates: Receiver<UiMessage>, keys: Keymap) -> Self {
        Self {
            events: Some(events),
            updates,
            keys,
            scene: None,
            texture: None,
            fit_pending: true,
            last_sent: None,
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
            panning: false,
        }
    }

    fn send(&self, event: Event) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn image_size(&self) -> (f32, f32) {
        self.scene
            .as_ref()
            .map(|s| (s.image.width() as f32, s.image.height() as f32))
            .unwrap_or((800.0, 600.0))
    }

    fn drain_updates(&mut self, ctx: &egui::Context) {
        while let Ok(msg) = self.updates.try_recv() {
            match msg {
                UiMessage::Scene(scene) => {
                    let new_image = self
                        .scene
                        .as_ref()
                        .map(|s| s.image_id != scene.image_id)
                        .unwrap_or(true);
                    if new_image {
                        self.texture = None;
                        self.fit_pending = true;
                        self.last_sent = None;
                        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
                            "bbox-annotate: {}",
                            scene.image_id
                        )));
                    }
                    self.scene = Some(scene);
                }
                UiMessage::Finished => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            }
        }
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        if let Some(scene) = &self.scene {
            let size = [scene.image.width() as usize, scene.image.height() as usize];
            let pixels = scene.image.as_flat_samples();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            self.texture = Some(ctx.load_texture(
                scene.image_id.clone(),
                color_image,
                egui::TextureOptions::NEAREST,
            ));
        }
    }

    fn fit_to(&mut self, canvas_rect: egui::Rect) {
        let (w, h) = self.image_size();
        self.zoom = (canvas_rect.width() / w)
            .min(canvas_rect.height() / h)
            .clamp(0.1, 1.0);
        self.pan = egui::Vec2::ZERO;
        self.fit_pending = false;
    }

    /// Convert image-space coords to screen-space
    fn image_to_screen(&self, canvas_rect: egui::Rect, img_pos: egui::Pos2) -> egui::Pos2 {
        let (w, h) = self.image_size();
        canvas_rect.center() + self.pan + (img_pos.to_vec2() - egui::vec2(w, h) * 0.5) * self.zoom
    }

    /// Convert screen-space coords to the image pixel under them
    fn screen_to_image(&self, canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> Point {
        let (w, h) = self.image_size();
        let rel = screen_pos - canvas_rect.center() - self.pan;
        Point::new(
            (rel.x / self.zoom + w * 0.5).floor() as i32,
            (rel.y / self.zoom + h * 0.5).floor() as i32,
        )
    }

    fn box_rect(&self, canvas_rect: egui::Rect, b: &BBox) -> egui::Rect {
        let (min, max) = b.corners();
        // outline through pixel centres
        let to_screen = |p: Point| {
            self.image_to_screen(canvas_rect, egui::pos2(p.x as f32 + 0.5, p.y as f32 + 0.5))
        };
        egui::Rect::from_min_max(to_screen(min), to_screen(max))
    }

    fn draw_boxes(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let Some(scene) = &self.scene else {
            return;
        };
        let committed = stroke(COMMITTED_COLOR);
        for b in &scene.committed {
            painter.rect_stroke(self.box_rect(canvas_rect, b), 0.0, committed, egui::StrokeKind::Middle);
        }
        if let Some(draft) = &scene.draft {
            painter.rect_stroke(
                self.box_rect(canvas_rect, draft),
                0.0,
                stroke(DRAFT_COLOR),
                egui::StrokeKind::Middle,
            );
        }
    }

    fn forward_keys(&self, ctx: &egui::Context) {
        let pressed: Vec<(egui::Key, bool)> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|e| match e {
                    egui::Event::Key {
                        key,
                        pressed: true,
                        repeat,
                        ..
                    } => Some((*key, *repeat)),
                    _ => None,
                })
                .collect()
        });
        for (key, repeat) in pressed {
            if let Some(event) = self.keys.event_for(key, repeat) {
                self.send(event);
            }
        }
    }
}

fn stroke([r, g, b, a]: [u8; 4]) -> egui::Stroke {
    egui::Stroke::new(1.5, egui::Color32::from_rgba_unmultiplied(r, g, b, a))
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for AnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            // stop forwarding input; run_window sends Quit once the loop exits
            self.events = None;
        }

        self.drain_updates(ctx);
        self.ensure_texture(ctx);
        self.forward_keys(ctx);

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match &self.scene {
                    Some(scene) => {
                        ui.label(scene.image_id.as_str());
                        ui.separator();
                        ui.label(format!("{} boxes", scene.committed.len()));
                    }
                    None => {
                        ui.label("loading…");
                    }
                }
                ui.separator();
                ui.label(self.keys.help());
                ui.separator();
                ui.label(format!("Zoom: {:.0}%", self.zoom * 100.0));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;

            if self.fit_pending && self.scene.is_some() {
                self.fit_to(canvas_rect);
            }

            painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

            if let Some(ref tex) = self.texture {
                let (w, h) = self.image_size();
                let img_rect = egui::Rect::from_min_max(
                    self.image_to_screen(canvas_rect, egui::Pos2::ZERO),
                    self.image_to_screen(canvas_rect, egui::pos2(w, h)),
                );
                painter.image(
                    tex.id(),
                    img_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }

            self.draw_boxes(&painter, canvas_rect);

            // Handle pan (middle mouse button)
            if ctx.input(|i| i.pointer.middle_down()) {
                self.pan += ctx.input(|i| i.pointer.delta());
                self.panning = true;
            } else {
                self.panning = false;
            }

            // Handle zoom (scroll wheel)
            let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
            if scroll_delta != 0.0 && response.hovered() {
                let zoom_factor = 1.0 + scroll_delta * 0.002;
                let new_zoom = (self.zoom * zoom_factor).clamp(0.1, 10.0);
                if let Some(cursor) = response.hover_pos() {
                    let cursor_rel = cursor - canvas_rect.center() - self.pan;
                    self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
                }
                self.zoom = new_zoom;
            }

            if self.panning || self.scene.is_none() {
                return;
            }

            // Primary button drives the draft box
            if response.clicked_by(egui::PointerButton::Primary) {
                if let Some(pos) = response.interact_pointer_pos() {
                    let p = self.screen_to_image(canvas_rect, pos);
                    self.send(Event::Press(p));
                    self.send(Event::Release(p));
                }
            }

            if response.drag_started_by(egui::PointerButton::Primary) {
                let origin = ctx
                    .input(|i| i.pointer.press_origin())
                    .or(response.interact_pointer_pos());
                if let Some(pos) = origin {
                    let p = self.screen_to_image(canvas_rect, pos);
                    self.send(Event::Press(p));
                    self.last_sent = Some(p);
                }
            }

            if response.dragged_by(egui::PointerButton::Primary) {
                if let Some(pos) = response.interact_pointer_pos() {
                    let p = self.screen_to_image(canvas_rect, pos);
                    if self.last_sent != Some(p) {
                        self.send(Event::Move(p));
                        self.last_sent = Some(p);
                    }
                }
            }

            if response.drag_stopped_by(egui::PointerButton::Primary) {
                let end = response
                    .interact_pointer_pos()
                    .or(ctx.input(|i| i.pointer.latest_pos()));
                if let Some(pos) = end {
                    self.send(Event::Release(self.screen_to_image(canvas_rect, pos)));
                }
                self.last_sent = None;
            }
        });
    }
}

// ── Entry ───────────────────────────────────────────────────────────────────

/// Opens the annotation window and runs `job` on a worker thread against
/// it. Once the window is gone the engine is sent Quit and joined, so an
/// in-flight save completes before this returns. `None` means the window
/// never got far enough to start the engine.
pub fn run_window<T, F>(keys: Keymap, job: F) -> anyhow::Result<Option<T>>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn EventSource, &mut dyn Surface) -> T + Send + 'static,
{
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let (ui_tx, ui_rx) = crossbeam_channel::unbounded();
    let handle: Arc<Mutex<Option<JoinHandle<T>>>> = Arc::new(Mutex::new(None));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("bbox-annotate"),
        ..Default::default()
    };

    let slot = Arc::clone(&handle);
    let quit_tx = event_tx.clone();
    eframe::run_native(
        "bbox-annotate",
        options,
        Box::new(move |cc| {
            let mut events = ChannelEvents { rx: event_rx };
            let mut surface = ChannelSurface {
                tx: ui_tx,
                ctx: cc.egui_ctx.clone(),
            };
            let worker = std::thread::Builder::new()
                .name("annotate-engine".to_string())
                .spawn(move || {
                    let out = job(&mut events, &mut surface);
                    surface.finish();
                    out
                })?;
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(worker);
            }
            Ok(Box::new(AnnotateApp::new(event_tx, ui_rx, keys)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("failed to run window: {e}"))?;

    let Some(worker) = handle.lock().ok().and_then(|mut h| h.take()) else {
        return Ok(None);
    };
    wind_down(&quit_tx, worker).map(Some)
}

/// Delivers Quit to the engine and waits for it. A worker that already
/// finished has dropped its receiver, so the send may fail harmlessly.
fn wind_down<T>(quit: &Sender<Event>, worker: JoinHandle<T>) -> anyhow::Result<T> {
    if quit.send(Event::Command(Command::Quit)).is_ok() && !worker.is_finished() {
        log::info!("window closed, waiting for the engine to finish");
    }
    worker
        .join()
        .map_err(|_| anyhow::anyhow!("annotation engine panicked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_resolve() {
        let keys = Keymap::resolve(&KeyBindings::default()).unwrap();
        assert_eq!(keys.command(egui::Key::D), Some(Command::Undo));
        assert_eq!(keys.command(egui::Key::Space), Some(Command::Save));
        assert_eq!(keys.command(egui::Key::Q), Some(Command::Quit));
        assert_eq!(keys.command(egui::Key::A), None);
    }

    #[test]
    fn unknown_key_name_is_a_config_error() {
        let bindings = KeyBindings {
            quit: "NotAKey".to_string(),
            ..KeyBindings::default()
        };
        assert!(matches!(Keymap::resolve(&bindings), Err(AnnotateError::Config(_))));
    }

    #[test]
    fn held_save_and_quit_fire_once() {
        let keys = Keymap::resolve(&KeyBindings::default()).unwrap();
        let save = Event::Command(Command::Save);
        assert_eq!(keys.event_for(egui::Key::Space, false), Some(save));
        assert_eq!(keys.event_for(egui::Key::Space, true), None);
        assert_eq!(keys.event_for(egui::Key::Q, true), None);
        // undo may repeat to peel off several boxes
        assert_eq!(keys.event_for(egui::Key::D, true), Some(Event::Command(Command::Undo)));
        assert_eq!(keys.event_for(egui::Key::A, true), Some(Event::Other));
    }

    #[test]
    fn window_strokes_match_preview_colors() {
        assert_eq!(stroke(COMMITTED_COLOR).color, egui::Color32::from_rgb(0, 255, 0));
        assert_eq!(stroke(DRAFT_COLOR).color, egui::Color32::from_rgb(255, 0, 0));
    }

    #[test]
    fn closing_waits_for_the_engine_to_take_quit() {
        let (tx, rx) = crossbeam_channel::unbounded();
        // the window side still holds a sender, so only an explicit Quit ends this
        let ui_tx = tx.clone();
        let worker = std::thread::spawn(move || {
            let mut events = ChannelEvents { rx };
            let mut seen = Vec::new();
            loop {
                let event = events.next_event();
                seen.push(event);
                if event == Event::Command(Command::Quit) {
                    return seen;
                }
            }
        });
        ui_tx.send(Event::Command(Command::Undo)).unwrap();
        let seen = wind_down(&tx, worker).unwrap();
        assert_eq!(
            seen,
            vec![Event::Command(Command::Undo), Event::Command(Command::Quit)]
        );
        drop(ui_tx);
    }

    #[test]
    fn hung_up_window_reads_as_quit() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Event::Command(Command::Undo)).unwrap();
        drop(tx);
        let mut events = ChannelEvents { rx };
        assert_eq!(events.next_event(), Event::Command(Command::Undo));
        assert_eq!(events.next_event(), Event::Command(Command::Quit));
    }
}
