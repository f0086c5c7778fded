use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::layout::SectionLayout;
use crate::preview::{Opened, Previewer};
use crate::render;
use crate::scroll::{HeadingPositions, HeadingSpan};
use crate::watch::{LiveReload, WatchStatus};

const APP_KEY: &str = "md-preview-state";
const APP_TITLE: &str = "Markdown Previewer";

/// Persisted state saved between sessions
#[derive(Serialize, Deserialize, Default)]
struct PersistedState {
    dark_mode: Option<bool>,
    zoom_level: Option<f32>,
    show_outline: Option<bool>,
}

/// Startup options taken from the command line
pub struct LaunchOptions {
    pub file: Option<PathBuf>,
    pub watch: bool,
    pub activation_offset: f32,
}

pub struct PreviewApp {
    preview: Previewer<SectionLayout>,
    cache: CommonMarkCache,
    current_path: Option<PathBuf>,
    dark_mode: bool,
    // Zoom level (1.0 = 100%, range: 0.5 to 3.0)
    zoom_level: f32,
    watch_enabled: bool,
    live_reload: LiveReload,
    error_message: Option<String>,
    is_dragging: bool,
    // Heading rects measured while painting the last frame
    positions: HeadingPositions,
    // Content offset an outline click asked to scroll to
    pending_scroll: Option<f32>,
}

/// Only a file that was actually read is worth watching
fn watch_after_load(result: &Result<Opened, LoadError>, watch_enabled: bool) -> bool {
    watch_enabled && result.is_ok()
}

fn viewer<'f>() -> CommonMarkViewer<'f> {
    CommonMarkViewer::new()
        .max_image_width(Some(800))
        .indentation_spaces(2)
        .show_alt_text_on_hover(true)
        .syntax_theme_dark("base16-ocean.dark")
        .syntax_theme_light("base16-ocean.light")
}

impl PreviewApp {
    pub fn new(cc: &eframe::CreationContext<'_>, options: LaunchOptions) -> Self {
        let persisted: PersistedState = cc
            .storage
            .and_then(|s| eframe::get_value(s, APP_KEY))
            .unwrap_or_default();

        let dark_mode = persisted
            .dark_mode
            .unwrap_or_else(|| cc.egui_ctx.style().visuals.dark_mode);
        let zoom_level = persisted.zoom_level.unwrap_or(1.0).clamp(0.5, 3.0);

        let mut preview = Previewer::new(SectionLayout, options.activation_offset);
        preview.set_show_outline(persisted.show_outline.unwrap_or(true));

        let mut app = Self {
            preview,
            cache: CommonMarkCache::default(),
            current_path: None,
            dark_mode,
            zoom_level,
            watch_enabled: options.watch,
            live_reload: LiveReload::default(),
            error_message: None,
            is_dragging: false,
            positions: HeadingPositions::new(),
            pending_scroll: None,
        };

        if let Some(path) = options.file {
            app.load_path(path);
        }
        app
    }

    fn load_path(&mut self, path: PathBuf) {
        let result = self.preview.open_path(&path);
        if matches!(&result, Err(e) if e.is_rejection()) {
            self.report(result);
            return;
        }

        let watch = watch_after_load(&result, self.watch_enabled);
        self.current_path = Some(path);
        self.after_content_change();
        self.report(result);
        if watch {
            self.start_watching();
        } else {
            self.live_reload.stop();
        }
    }

    fn load_dropped(&mut self, dropped: egui::DroppedFile) {
        if let Some(path) = dropped.path {
            self.load_path(path);
            return;
        }

        let Some(bytes) = dropped.bytes else {
            log::warn!("Dropped file {} has neither path nor contents", dropped.name);
            return;
        };
        let result = self.preview.open(&dropped.name, &dropped.mime, &bytes);
        if result.is_ok() {
            // In-memory drops have nothing on disk to watch.
            self.live_reload.stop();
            self.current_path = None;
            self.after_content_change();
        }
        self.report(result);
    }

    fn reload_current_file(&mut self) {
        if let Some(path) = self.current_path.clone() {
            log::info!("Reloading file: {:?}", path);
            let result = self.preview.open_path(&path);
            self.after_content_change();
            self.report(result);
        }
    }

    /// Per-document view state that must not outlive the document
    fn after_content_change(&mut self) {
        self.cache = CommonMarkCache::default();
        self.positions.clear();
        self.pending_scroll = None;
    }

    fn report(&mut self, result: Result<Opened, LoadError>) {
        self.error_message = match result {
            Ok(Opened { lossy: true }) => Some(
                "Warning: File contains invalid UTF-8 characters (replaced with �)".to_string(),
            ),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
    }

    fn reset(&mut self) {
        self.live_reload.stop();
        self.current_path = None;
        self.error_message = None;
        self.preview.reset();
        self.after_content_change();
    }

    fn open_file_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Markdown", &["md", "markdown"])
            .pick_file()
        {
            self.load_path(path);
        }
    }

    fn export_dialog(&mut self) {
        if self.preview.is_empty() {
            self.error_message = Some(crate::error::ExportError::NoDocument.to_string());
            return;
        }

        let title = self.preview.file_name().unwrap_or("Document").to_string();
        let suggested = self
            .current_path
            .as_deref()
            .map(render::suggest_export_path)
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| "document.html".to_string());

        if let Some(output) = rfd::FileDialog::new()
            .add_filter("HTML", &["html"])
            .set_file_name(suggested)
            .save_file()
        {
            if let Err(e) = render::export_to_file(&title, self.preview.content(), &output) {
                log::error!("Export failed: {}", e);
                self.error_message = Some(e.to_string());
            }
        }
    }

    fn start_watching(&mut self) {
        let Some(path) = self.current_path.clone() else {
            log::warn!("Cannot start watching: no file loaded");
            return;
        };
        match self.live_reload.start(&path) {
            Ok(()) => self.watch_enabled = true,
            Err(e) => {
                log::error!("Failed to watch file {:?}: {}", path, e);
                self.error_message = Some(format!("Failed to watch file: {}", e));
            }
        }
    }

    fn toggle_watch(&mut self) {
        if self.live_reload.is_watching() {
            self.live_reload.stop();
            self.watch_enabled = false;
        } else {
            self.start_watching();
        }
    }

    fn check_file_changes(&mut self) {
        match self.live_reload.poll() {
            WatchStatus::Idle => {}
            WatchStatus::Changed => self.reload_current_file(),
            WatchStatus::Recovered => {
                self.error_message = Some("File watcher recovered after error".to_string());
            }
            WatchStatus::Failed(message) => {
                self.error_message = Some(message);
                if !self.live_reload.is_watching() {
                    self.watch_enabled = false;
                }
            }
        }
    }

    fn window_title(&self) -> String {
        match self.preview.file_name() {
            Some(name) => format!("{} - {}", name, APP_TITLE),
            None => APP_TITLE.to_string(),
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let mut open_dialog = false;
        let mut new_file = false;
        let mut export = false;
        let mut toggle_watch = false;
        let mut toggle_dark = false;
        let mut toggle_outline = false;
        let mut quit_app = false;
        let mut zoom_delta: f32 = 0.0;

        ctx.input(|i| {
            // Ctrl+O: Open file
            if i.modifiers.ctrl && !i.modifiers.shift && i.key_pressed(egui::Key::O) {
                open_dialog = true;
            }
            // Ctrl+Shift+O: Toggle outline
            if i.modifiers.ctrl && i.modifiers.shift && i.key_pressed(egui::Key::O) {
                toggle_outline = true;
            }
            // Ctrl+N: Back to the empty document
            if i.modifiers.ctrl && i.key_pressed(egui::Key::N) {
                new_file = true;
            }
            // Ctrl+E: Export HTML
            if i.modifiers.ctrl && i.key_pressed(egui::Key::E) {
                export = true;
            }
            if i.modifiers.ctrl && i.key_pressed(egui::Key::W) {
                toggle_watch = true;
            }
            if i.modifiers.ctrl && i.key_pressed(egui::Key::D) {
                toggle_dark = true;
            }
            if i.modifiers.ctrl && i.key_pressed(egui::Key::Q) {
                quit_app = true;
            }
            if i.modifiers.ctrl && (i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals)) {
                zoom_delta = 0.1;
            }
            if i.modifiers.ctrl && i.key_pressed(egui::Key::Minus) {
                zoom_delta = -0.1;
            }
            if i.modifiers.ctrl && i.key_pressed(egui::Key::Num0) {
                zoom_delta = 1.0 - self.zoom_level;
            }
            // Ctrl + scroll wheel for zoom
            if i.modifiers.ctrl && i.raw_scroll_delta.y != 0.0 {
                zoom_delta = if i.raw_scroll_delta.y > 0.0 { 0.1 } else { -0.1 };
            }
        });

        if zoom_delta != 0.0 {
            self.zoom_level = (self.zoom_level + zoom_delta).clamp(0.5, 3.0);
        }
        if open_dialog {
            self.open_file_dialog();
        }
        if new_file {
            self.reset();
        }
        if export {
            self.export_dialog();
        }
        if toggle_watch && self.current_path.is_some() {
            self.toggle_watch();
        }
        if toggle_dark {
            self.dark_mode = !self.dark_mode;
        }
        if toggle_outline {
            self.preview.toggle_outline();
        }
        if quit_app {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn handle_drop(&mut self, ctx: &egui::Context) {
        let (hovering, dropped) = ctx.input(|i| {
            (
                !i.raw.hovered_files.is_empty(),
                i.raw.dropped_files.first().cloned(),
            )
        });
        self.is_dragging = hovering;
        if let Some(dropped) = dropped {
            self.load_dropped(dropped);
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.add(egui::Button::new("Open...").shortcut_text("Ctrl+O")).clicked() {
                        self.open_file_dialog();
                        ui.close();
                    }
                    let has_document = !self.preview.is_empty() || self.preview.file_name().is_some();
                    if ui
                        .add_enabled(has_document, egui::Button::new("New File").shortcut_text("Ctrl+N"))
                        .clicked()
                    {
                        self.reset();
                        ui.close();
                    }
                    if ui
                        .add_enabled(
                            !self.preview.is_empty(),
                            egui::Button::new("Export HTML...").shortcut_text("Ctrl+E"),
                        )
                        .clicked()
                    {
                        self.export_dialog();
                        ui.close();
                    }

                    ui.separator();

                    let is_watching = self.live_reload.is_watching();
                    let watch_text = if is_watching { "✓ Watch File" } else { "Watch File" };
                    if ui
                        .add_enabled(
                            self.current_path.is_some(),
                            egui::Button::new(watch_text).shortcut_text("Ctrl+W"),
                        )
                        .clicked()
                    {
                        self.toggle_watch();
                        ui.close();
                    }

                    ui.separator();

                    if ui.add(egui::Button::new("Quit").shortcut_text("Ctrl+Q")).clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close();
                    }
                });

                ui.menu_button("View", |ui| {
                    let theme_text = if self.dark_mode { "☀ Light Mode" } else { "🌙 Dark Mode" };
                    if ui.add(egui::Button::new(theme_text).shortcut_text("Ctrl+D")).clicked() {
                        self.dark_mode = !self.dark_mode;
                        ui.close();
                    }

                    let outline_text = if self.preview.show_outline() {
                        "✓ Show Outline"
                    } else {
                        "Show Outline"
                    };
                    if ui.add(egui::Button::new(outline_text).shortcut_text("Ctrl+Shift+O")).clicked() {
                        self.preview.toggle_outline();
                        ui.close();
                    }

                    ui.separator();

                    if ui.add(egui::Button::new("Zoom In").shortcut_text("Ctrl++")).clicked() {
                        self.zoom_level = (self.zoom_level + 0.1).min(3.0);
                        ui.close();
                    }
                    if ui.add(egui::Button::new("Zoom Out").shortcut_text("Ctrl+-")).clicked() {
                        self.zoom_level = (self.zoom_level - 0.1).max(0.5);
                        ui.close();
                    }
                    if ui.add(egui::Button::new("Reset Zoom").shortcut_text("Ctrl+0")).clicked() {
                        self.zoom_level = 1.0;
                        ui.close();
                    }
                });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if (self.zoom_level - 1.0).abs() > 0.01 {
                        ui.label(
                            egui::RichText::new(format!("{}%", (self.zoom_level * 100.0).round() as i32))
                                .small()
                                .color(ui.visuals().weak_text_color()),
                        );
                        ui.separator();
                    }

                    if self.live_reload.is_watching() {
                        ui.label(egui::RichText::new("● LIVE").color(egui::Color32::from_rgb(100, 200, 100)));
                        ui.separator();
                    }

                    if let Some(name) = self.preview.file_name() {
                        ui.label(egui::RichText::new(name).strong());
                    }
                });
            });
        });
    }

    fn outline_panel(&mut self, ctx: &egui::Context) {
        if !self.preview.show_outline() || self.preview.is_empty() {
            return;
        }

        // Avoid treating a panel resize drag as a click on an entry
        let is_dragging = ctx.input(|i| i.pointer.any_down());
        let mut clicked: Option<String> = None;

        egui::SidePanel::left("outline")
            .resizable(true)
            .default_width(220.0)
            .min_width(120.0)
            .max_width(400.0)
            .show(ctx, |ui| {
                ui.add_space(4.0);
                ui.heading("Table of Contents");
                ui.separator();

                let headings = self.preview.headings();
                if headings.is_empty() {
                    ui.label(egui::RichText::new("No headings found").color(ui.visuals().weak_text_color()));
                    return;
                }

                let active = self.preview.active_heading();
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for heading in headings {
                            ui.horizontal(|ui| {
                                // h1 flush left, 12 points per level below
                                ui.add_space(heading.level.saturating_sub(1) as f32 * 12.0);
                                let selected = active == Some(heading.id.as_str());
                                let response = ui.selectable_label(selected, &heading.text);
                                if !is_dragging && response.clicked() {
                                    clicked = Some(heading.id.clone());
                                }
                            });
                        }
                    });
            });

        if let Some(id) = clicked {
            match self.preview.select(&id, &self.positions) {
                Some(offset) => self.pending_scroll = Some(offset),
                None => log::debug!("Heading {} has no rendered element", id),
            }
        }
    }

    fn drop_zone(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() * 0.15);

            let frame = egui::Frame::group(ui.style())
                .inner_margin(egui::Margin::same(32))
                .stroke(egui::Stroke::new(2.0, ui.visuals().weak_text_color()));
            let response = frame
                .show(ui, |ui| {
                    ui.set_width(420.0_f32.min(ui.available_width()));
                    ui.vertical_centered(|ui| {
                        ui.label(egui::RichText::new("⬆").size(40.0).color(ui.visuals().weak_text_color()));
                        ui.add_space(8.0);
                        ui.label(egui::RichText::new("Drag & drop your markdown file here").size(18.0));
                        ui.label(egui::RichText::new("or click to browse files").color(ui.visuals().weak_text_color()));
                    });
                })
                .response
                .interact(egui::Sense::click())
                .on_hover_cursor(egui::CursorIcon::PointingHand);
            if response.clicked() {
                self.open_file_dialog();
            }

            ui.add_space(24.0);
            ui.label(egui::RichText::new("Upload a markdown file to preview its content").color(ui.visuals().weak_text_color()));
            ui.add_space(12.0);
            ui.group(|ui| {
                ui.strong("How to use");
                ui.label("• Open a markdown (.md) file with Ctrl+O or drop it on this window");
                ui.label("• Headings appear in the table of contents on the left");
                ui.label("• Click a heading to jump to it; the current section is highlighted");
                ui.label("• Ctrl+N starts over with a new file");
            });
        });
    }

    fn content_panel(&mut self, ui: &mut egui::Ui) {
        let scroll_area = egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .scroll_source(egui::scroll_area::ScrollSource::SCROLL_BAR | egui::scroll_area::ScrollSource::MOUSE_WHEEL);

        let scroll_request = self.pending_scroll.take();
        let active = self.preview.active_heading().map(str::to_owned);
        let mut positions = HeadingPositions::new();
        let mut scroll_offset = 0.0;
        let cache = &mut self.cache;
        let highlight = ui.visuals().selection.stroke.color;

        scroll_area.show_viewport(ui, |ui, viewport| {
            scroll_offset = viewport.min.y;
            let origin = ui.min_rect().top();

            if let Some(offset) = scroll_request {
                let target = egui::Rect::from_min_size(
                    egui::pos2(ui.min_rect().left(), origin + offset),
                    egui::vec2(1.0, 1.0),
                );
                ui.scroll_to_rect(target, Some(egui::Align::TOP));
            }

            let Some(sections) = self.preview.rendered() else {
                return;
            };
            for (idx, section) in sections.iter().enumerate() {
                if let (Some(anchor), Some(heading)) = (&section.anchor, &section.heading) {
                    let rect = ui
                        .push_id(("heading", idx), |ui| {
                            viewer().show(ui, cache, heading);
                        })
                        .response
                        .rect;
                    positions.record(anchor, HeadingSpan::new(rect.top() - origin, rect.height()));

                    if active.as_deref() == Some(anchor.as_str()) {
                        ui.painter().rect_stroke(
                            rect.expand(4.0),
                            4.0,
                            egui::Stroke::new(2.0, highlight),
                            egui::StrokeKind::Outside,
                        );
                    }
                }
                if !section.body.trim().is_empty() {
                    ui.push_id(("body", idx), |ui| {
                        viewer().show(ui, cache, &section.body);
                    });
                }
            }
        });

        self.positions = positions;
        if self.preview.on_scroll(scroll_offset, &self.positions) || self.preview.is_settling() {
            // The outline was painted before this frame's offset was known, and
            // a settling scroll needs one more frame to notice it has stopped
            ui.ctx().request_repaint();
        }
    }
}

impl eframe::App for PreviewApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let state = PersistedState {
            dark_mode: Some(self.dark_mode),
            zoom_level: Some(self.zoom_level),
            show_outline: Some(self.preview.show_outline()),
        };
        eframe::set_value(storage, APP_KEY, &state);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_file_changes();
        if self.live_reload.is_watching() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        ctx.set_visuals(if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });
        ctx.style_mut(|style| {
            style.url_in_tooltip = true;
        });
        ctx.set_zoom_factor(self.zoom_level);
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(self.window_title()));

        self.handle_shortcuts(ctx);
        self.handle_drop(ctx);
        self.menu_bar(ctx);
        self.outline_panel(ctx);

        let mut clear_error = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(error) = &self.error_message {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("⚠").color(egui::Color32::from_rgb(255, 200, 100)));
                    ui.label(egui::RichText::new(error).color(egui::Color32::from_rgb(255, 200, 100)));
                    if ui.small_button("✕").clicked() {
                        clear_error = true;
                    }
                });
                ui.separator();
            }

            if self.preview.is_empty() {
                self.drop_zone(ui);
            } else {
                self.content_panel(ui);
            }
        });
        if clear_error {
            self.error_message = None;
        }

        if self.is_dragging {
            let screen_rect = ctx.available_rect();
            let painter = ctx.layer_painter(egui::LayerId::new(
                egui::Order::Foreground,
                egui::Id::new("drop_overlay"),
            ));
            painter.rect_filled(screen_rect, 0.0, egui::Color32::from_rgba_unmultiplied(0, 0, 0, 180));
            painter.text(
                screen_rect.center(),
                egui::Align2::CENTER_CENTER,
                "Drop markdown file here",
                egui::FontId::proportional(24.0),
                egui::Color32::WHITE,
            );
        }
    }
}
