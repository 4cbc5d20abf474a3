use std::f32::consts::FRAC_PI_2;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};

use bevy::input::ButtonInput;
use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::{PresentMode, PrimaryWindow};
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};
use mapedit_config::AppConfig;
use mapedit_core::document::{CUSTOM_OPTIONS_KEY, MapParameter};
use mapedit_core::geometry::Point3;
use mapedit_engine::command::{CommandBus, CommandContext, CommandRequest};
use mapedit_engine::session::{Session, ViewMode};
use mapedit_engine::viewer::{
    CameraFraming, PointCloud, PointerPosition, Ray, SceneBackend, ViewportSize,
    VisualizationPanel, pick_nearest,
};
use mapedit_io::remote::FetchedDocument;
use mapedit_io::{DocumentSaver, IoError, JsonFacade, to_pretty_json};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{COPY_CONFIRMATION, NO_DOCUMENT_NOTICE};
use crate::errors::FrontendError;
use crate::form::{EditBuffer, FieldKey};
use crate::loader::{InitialSource, Ingestor, apply_fetch_result};
use crate::resource_locator::ExportLocator;

const ORBIT_SENSITIVITY: f32 = 0.01;
const PAN_SENSITIVITY: f32 = 0.002;
const ZOOM_SENSITIVITY: f32 = 0.1;
const MIN_PITCH: f32 = -FRAC_PI_2 + 0.05;
const MAX_PITCH: f32 = FRAC_PI_2 - 0.05;
const POINT_RADIUS_RATIO: f32 = 0.01;
const MIN_POINT_RADIUS: f32 = 0.2;

/// 把场景构建与释放排入队列，由 ECS 系统在帧内执行；拾取使用轨道相机的实时快照。
pub struct BevyPointScene {
    viewport: ViewportSize,
    camera: Option<CameraFraming>,
    threshold: f64,
    next_id: u64,
    builds: Vec<PendingBuild>,
    disposals: Vec<u64>,
}

struct PendingBuild {
    scene: u64,
    points: Vec<Vec3>,
    framing: CameraFraming,
    extent: f32,
}

pub struct PointSceneHandle {
    id: u64,
    cloud: PointCloud,
}

impl BevyPointScene {
    fn new(viewport: ViewportSize, threshold: f64) -> Self {
        Self {
            viewport,
            camera: None,
            threshold,
            next_id: 0,
            builds: Vec::new(),
            disposals: Vec::new(),
        }
    }
}

impl SceneBackend for BevyPointScene {
    type Handle = PointSceneHandle;

    fn build(&mut self, cloud: &PointCloud, framing: &CameraFraming) -> PointSceneHandle {
        self.next_id += 1;
        self.builds.push(PendingBuild {
            scene: self.next_id,
            points: cloud.points().iter().map(|point| point.as_vec3().as_vec3()).collect(),
            framing: *framing,
            extent: cloud.bounds().max_extent() as f32,
        });
        self.camera = Some(*framing);
        PointSceneHandle {
            id: self.next_id,
            cloud: cloud.clone(),
        }
    }

    fn dispose(&mut self, handle: PointSceneHandle) {
        self.builds.retain(|build| build.scene != handle.id);
        self.disposals.push(handle.id);
    }

    fn pick(&self, handle: &PointSceneHandle, pointer: PointerPosition) -> Option<usize> {
        let camera = self.camera.as_ref()?;
        let (ndc_x, ndc_y) = self.viewport.to_ndc(pointer)?;
        let ray = Ray::from_camera(camera, ndc_x, ndc_y)?;
        pick_nearest(&ray, handle.cloud.points(), self.threshold)
    }
}

#[derive(Resource)]
struct ViewerPanel(VisualizationPanel<BevyPointScene>);

struct PendingFetch {
    input: String,
    receiver: Mutex<Receiver<Result<FetchedDocument, IoError>>>,
}

#[derive(Default)]
struct UiState {
    url_input: String,
    paste_input: String,
    offset_inputs: [String; 3],
    show_visualization: bool,
    show_json: bool,
    feedback: Option<String>,
    edits: EditBuffer,
}

#[derive(Resource)]
struct EditorState {
    session: Session,
    bus: CommandBus,
    ingestor: Arc<Ingestor>,
    export: ExportLocator,
    pending_fetch: Option<PendingFetch>,
    ui: UiState,
}

impl EditorState {
    fn dispatch(&mut self, request: &CommandRequest) {
        let mut context = CommandContext {
            session: &mut self.session,
        };
        let response = self.bus.dispatch(request, &mut context);
        if !response.success {
            let message = response.message.unwrap_or_default();
            warn!(command = %request.name, error = %message, "桌面端命令执行失败");
            self.ui.feedback = Some(message);
        }
    }
}

enum UiAction {
    Command(CommandRequest),
    OpenFile,
    Fetch,
    LoadPaste,
    ApplyOffset,
    Download,
    Copy(String),
}

#[derive(Component)]
struct MainCamera;

/// 轨道相机参数：右键旋转、中键平移、滚轮缩放。
#[derive(Component)]
struct OrbitCamera {
    focus: Vec3,
    radius: f32,
    yaw: f32,
    pitch: f32,
    min_radius: f32,
    max_radius: f32,
}

impl OrbitCamera {
    fn new(focus: Vec3, translation: Vec3) -> Self {
        let offset = translation - focus;
        let radius = offset.length().max(f32::EPSILON);
        Self {
            focus,
            radius,
            yaw: offset.z.atan2(offset.x),
            pitch: (offset.y / radius).asin(),
            min_radius: 0.5,
            max_radius: (radius * 20.0).max(50.0),
        }
    }

    fn translation(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        self.focus
            + Vec3::new(
                self.radius * cos_pitch * cos_yaw,
                self.radius * sin_pitch,
                self.radius * cos_pitch * sin_yaw,
            )
    }
}

#[derive(Component)]
struct ScenePoint {
    scene: u64,
    index: usize,
}

#[derive(Resource, Clone)]
struct PointAssets {
    base: Handle<StandardMaterial>,
    hovered: Handle<StandardMaterial>,
}

pub fn launch(config: &AppConfig, initial: Option<&InitialSource>) -> Result<(), FrontendError> {
    let ingestor = Ingestor::from_config(&config.ingest)?;
    let mut session = Session::new();
    session.set_view_mode(if config.viewer.default_3d {
        ViewMode::Spatial
    } else {
        ViewMode::Flat
    });
    let mut feedback = None;
    if let Some(source) = initial
        && !ingestor.ingest_initial(&mut session, source)
    {
        feedback = session.error().map(str::to_string);
    }

    let state = EditorState {
        session,
        bus: CommandBus::new(),
        ingestor: Arc::new(ingestor),
        export: ExportLocator::from_config(&config.export),
        pending_fetch: None,
        ui: UiState {
            offset_inputs: ["0".to_string(), "0".to_string(), "0".to_string()],
            show_visualization: true,
            feedback,
            ..UiState::default()
        },
    };
    let viewport = ViewportSize {
        width: 1280.0,
        height: 720.0,
    };
    let panel = VisualizationPanel::new(
        BevyPointScene::new(viewport, config.viewer.pick_threshold),
        config.viewer.fov_degrees,
        viewport.aspect(),
    );

    App::new()
        .insert_resource(state)
        .insert_resource(ViewerPanel(panel))
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: config.frontend.bevy_window_title.clone(),
                present_mode: PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_systems(Startup, setup_scene)
        .add_systems(
            Update,
            (
                poll_remote_fetch,
                sync_viewer,
                apply_scene_changes,
                control_orbit_camera,
                update_hover,
                highlight_hovered,
            )
                .chain(),
        )
        .add_systems(EguiPrimaryContextPass, editor_ui)
        .run();
    Ok(())
}

fn setup_scene(
    mut commands: Commands,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let translation = Vec3::new(0.0, 0.0, 10.0);
    commands.spawn((
        Camera3d::default(),
        MainCamera,
        Transform::from_translation(translation).looking_at(Vec3::ZERO, Vec3::Y),
        OrbitCamera::new(Vec3::ZERO, translation),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 2_000.0,
            ..default()
        },
        Transform::from_xyz(-4.0, -2.0, -6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.insert_resource(PointAssets {
        base: materials.add(StandardMaterial {
            base_color: Color::srgb(0.2, 0.6, 1.0),
            ..default()
        }),
        hovered: materials.add(StandardMaterial {
            base_color: Color::srgb(1.0, 0.55, 0.1),
            ..default()
        }),
    });
}

fn poll_remote_fetch(mut state: ResMut<EditorState>) {
    let Some(pending) = state.pending_fetch.as_ref() else {
        return;
    };
    let received = match pending.receiver.lock() {
        Ok(receiver) => receiver.try_recv(),
        Err(_) => Err(TryRecvError::Disconnected),
    };
    match received {
        Ok(result) => {
            let input = pending.input.clone();
            state.pending_fetch = None;
            let EditorState { session, ui, .. } = &mut *state;
            apply_fetch_result(session, &input, result);
            ui.edits.clear();
            ui.feedback = session.error().map(str::to_string);
        }
        Err(TryRecvError::Empty) => {}
        Err(TryRecvError::Disconnected) => {
            warn!("远程获取线程异常退出");
            state.pending_fetch = None;
        }
    }
}

fn sync_viewer(
    state: Res<EditorState>,
    mut panel: ResMut<ViewerPanel>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    if let Ok(window) = windows.single() {
        let viewport = ViewportSize {
            width: window.width() as f64,
            height: window.height() as f64,
        };
        panel.0.backend_mut().viewport = viewport;
        panel.0.set_aspect(viewport.aspect());
    }
    if state.ui.show_visualization {
        panel.0.sync(&state.session);
    } else {
        panel.0.unmount();
    }
}

fn apply_scene_changes(
    mut commands: Commands,
    mut panel: ResMut<ViewerPanel>,
    mut meshes: ResMut<Assets<Mesh>>,
    assets: Res<PointAssets>,
    points: Query<(Entity, &ScenePoint)>,
    mut cameras: Query<(&mut Transform, &mut OrbitCamera, &mut Projection), With<MainCamera>>,
) {
    let backend = panel.0.backend_mut();
    let disposals = std::mem::take(&mut backend.disposals);
    let builds = std::mem::take(&mut backend.builds);

    for (entity, point) in &points {
        if disposals.contains(&point.scene) {
            commands.entity(entity).despawn();
        }
    }

    for build in builds {
        let radius = (build.extent * POINT_RADIUS_RATIO).max(MIN_POINT_RADIUS);
        let mesh = meshes.add(Sphere::new(radius));
        for (index, position) in build.points.iter().enumerate() {
            commands.spawn((
                Mesh3d(mesh.clone()),
                MeshMaterial3d(assets.base.clone()),
                Transform::from_translation(*position),
                ScenePoint {
                    scene: build.scene,
                    index,
                },
            ));
        }
        if let Ok((mut transform, mut orbit, mut projection)) = cameras.single_mut() {
            let target = point_to_vec3(build.framing.target);
            let position = point_to_vec3(build.framing.position);
            *orbit = OrbitCamera::new(target, position);
            *transform = Transform::from_translation(position).looking_at(target, Vec3::Y);
            *projection = Projection::Perspective(PerspectiveProjection {
                fov: build.framing.fov_degrees.to_radians() as f32,
                near: build.framing.near as f32,
                far: build.framing.far as f32,
                ..default()
            });
        }
        info!(scene = build.scene, points = build.points.len(), "生成点云实体");
    }
}

fn control_orbit_camera(
    mut motion_events: MessageReader<MouseMotion>,
    mut scroll_events: MessageReader<MouseWheel>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut query: Query<(&mut Transform, &mut OrbitCamera), With<MainCamera>>,
) {
    let mut delta = Vec2::ZERO;
    for motion in motion_events.read() {
        delta += motion.delta;
    }
    let mut scroll = 0.0;
    for event in scroll_events.read() {
        scroll += match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y * 0.05,
        };
    }

    let Ok((mut transform, mut orbit)) = query.single_mut() else {
        return;
    };
    if buttons.pressed(MouseButton::Right) && delta.length_squared() > 0.0 {
        orbit.yaw += delta.x * ORBIT_SENSITIVITY;
        orbit.pitch = (orbit.pitch + delta.y * ORBIT_SENSITIVITY).clamp(MIN_PITCH, MAX_PITCH);
    }
    if buttons.pressed(MouseButton::Middle) && delta.length_squared() > 0.0 {
        let right = transform.right();
        let up = transform.up();
        let scale = orbit.radius * PAN_SENSITIVITY;
        orbit.focus += right * (-delta.x * scale) + up * (delta.y * scale);
    }
    if scroll.abs() > f32::EPSILON {
        orbit.radius = (orbit.radius * (1.0 - scroll * ZOOM_SENSITIVITY))
            .clamp(orbit.min_radius, orbit.max_radius);
    }

    transform.translation = orbit.translation();
    transform.look_at(orbit.focus, Vec3::Y);
}

fn update_hover(
    mut panel: ResMut<ViewerPanel>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Transform, &OrbitCamera, &Projection), With<MainCamera>>,
) {
    let (Ok(window), Ok((transform, orbit, projection))) = (windows.single(), cameras.single())
    else {
        return;
    };
    let fov_degrees = match projection {
        Projection::Perspective(perspective) => (perspective.fov as f64).to_degrees(),
        _ => return,
    };
    let viewport = panel.0.backend_mut().viewport;
    let position = transform.translation;
    let focus = orbit.focus;
    panel.0.backend_mut().camera = Some(CameraFraming {
        position: Point3::new(position.x as f64, position.y as f64, position.z as f64),
        target: Point3::new(focus.x as f64, focus.y as f64, focus.z as f64),
        fov_degrees,
        aspect: viewport.aspect(),
        near: 0.1,
        far: f64::MAX,
    });
    if let Some(cursor) = window.cursor_position() {
        panel.0.hover(PointerPosition {
            x: cursor.x as f64,
            y: cursor.y as f64,
        });
    }
}

fn highlight_hovered(
    panel: Res<ViewerPanel>,
    assets: Res<PointAssets>,
    mut points: Query<(&ScenePoint, &mut MeshMaterial3d<StandardMaterial>)>,
) {
    let hovered = panel.0.hovered();
    for (point, mut material) in &mut points {
        let wanted = if hovered == Some(point.index + 1) {
            &assets.hovered
        } else {
            &assets.base
        };
        if material.0 != *wanted {
            material.0 = wanted.clone();
        }
    }
}

fn editor_ui(
    mut contexts: EguiContexts,
    mut state: ResMut<EditorState>,
    panel: Res<ViewerPanel>,
) {
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };
    let mut actions: Vec<UiAction> = Vec::new();
    let hover_label = panel.0.hover_label();

    {
        let EditorState {
            session,
            ui: ui_state,
            pending_fetch,
            ..
        } = &mut *state;

        egui::SidePanel::left("editor")
            .default_width(460.0)
            .show(ctx, |ui| {
                ui.heading("Map JSON Editor");
                ui.separator();

                ui.horizontal(|ui| {
                    if ui.button("Open JSON file…").clicked() {
                        actions.push(UiAction::OpenFile);
                    }
                    if let Some(label) = session.source_label() {
                        ui.label(format!("Loaded: {label}"));
                    }
                });
                ui.horizontal(|ui| {
                    ui.add(
                        egui::TextEdit::singleline(&mut ui_state.url_input)
                            .hint_text("https://…")
                            .desired_width(300.0),
                    );
                    let fetching = pending_fetch.is_some();
                    if ui
                        .add_enabled(!fetching, egui::Button::new("Fetch"))
                        .clicked()
                    {
                        actions.push(UiAction::Fetch);
                    }
                    if fetching {
                        ui.spinner();
                    }
                });
                ui.add(
                    egui::TextEdit::multiline(&mut ui_state.paste_input)
                        .hint_text("Paste JSON here")
                        .desired_rows(4),
                );
                if ui.button("Load pasted JSON").clicked() {
                    actions.push(UiAction::LoadPaste);
                }
                if let Some(error) = session.error() {
                    ui.colored_label(egui::Color32::RED, error);
                }
                if let Some(feedback) = &ui_state.feedback
                    && session.error() != Some(feedback.as_str())
                {
                    ui.label(feedback);
                }
                ui.separator();

                let Some(document) = session.document() else {
                    ui.label(NO_DOCUMENT_NOTICE);
                    return;
                };

                ui.label("Map parameters");
                for (label, parameter) in [
                    ("Name", MapParameter::Name),
                    ("Death height", MapParameter::DeathHeight),
                ] {
                    ui.horizontal(|ui| {
                        ui.label(label);
                        let key = FieldKey::Parameter(parameter);
                        let mut text = ui_state.edits.text(&key, document.parameter(parameter));
                        let field = ui.text_edit_singleline(&mut text);
                        if field.changed() {
                            ui_state.edits.update(key.clone(), text.clone());
                            actions.push(set_request(parameter, text));
                        }
                        if field.lost_focus() {
                            ui_state.edits.release(&key);
                        }
                    });
                }
                ui.separator();

                let selected = session.selected_category();
                egui::ComboBox::from_label("Category")
                    .selected_text(selected.unwrap_or("Select a category"))
                    .show_ui(ui, |ui| {
                        if ui.selectable_label(selected.is_none(), "Select a category").clicked() {
                            actions.push(UiAction::Command(CommandRequest::new(
                                "deselect",
                                Vec::<String>::new(),
                            )));
                        }
                        for category in document.categories() {
                            if ui
                                .selectable_label(selected == Some(category), category)
                                .clicked()
                            {
                                actions.push(UiAction::Command(CommandRequest::new(
                                    "select",
                                    [category],
                                )));
                            }
                        }
                    });

                if let (Some(category), Ok(entries)) = (selected, session.selected_entries()) {
                    ui.group(|ui| {
                        ui.label("Move All");
                        ui.horizontal(|ui| {
                            for (axis, input) in ["x", "y", "z"].into_iter().zip(ui_state.offset_inputs.iter_mut()) {
                                ui.label(axis.to_uppercase());
                                let field = ui.add(egui::TextEdit::singleline(input).desired_width(60.0));
                                if field.changed() {
                                    actions.push(UiAction::Command(CommandRequest::new(
                                        "offset",
                                        [axis.to_string(), input.clone()],
                                    )));
                                }
                            }
                            if ui.button("Apply").clicked() {
                                actions.push(UiAction::ApplyOffset);
                            }
                        });
                    });

                    ui.horizontal(|ui| {
                        if ui.button("Insert at beginning").clicked() {
                            actions.push(UiAction::Command(CommandRequest::new("insert", ["0"])));
                        }
                        if ui.button("Add at end").clicked() {
                            actions.push(UiAction::Command(CommandRequest::new(
                                "insert",
                                Vec::<String>::new(),
                            )));
                        }
                    });

                    let count = entries.len();
                    egui::ScrollArea::vertical()
                        .max_height(360.0)
                        .show(ui, |ui| {
                            for (index, entry) in entries.iter().enumerate() {
                                entry_row(
                                    ui,
                                    EntryRow {
                                        category,
                                        index,
                                        count,
                                        entry,
                                    },
                                    &mut ui_state.edits,
                                    &mut actions,
                                );
                            }
                        });

                    ui.separator();
                    ui.horizontal(|ui| {
                        let toggle = if ui_state.show_visualization {
                            "Hide Visualization"
                        } else {
                            "Show Visualization"
                        };
                        if ui.button(toggle).clicked() {
                            ui_state.show_visualization = !ui_state.show_visualization;
                        }
                        let other = session.view_mode().toggled().label();
                        if ui.button(format!("Switch to {other}")).clicked() {
                            actions.push(UiAction::Command(CommandRequest::new("view", ["toggle"])));
                        }
                    });
                    if ui_state.show_visualization {
                        ui.label(hover_label.as_deref().unwrap_or("Hover over a point"));
                    }
                }

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Download JSON").clicked() {
                        actions.push(UiAction::Download);
                    }
                    let json_toggle = if ui_state.show_json { "Hide JSON" } else { "Show JSON" };
                    if ui.button(json_toggle).clicked() {
                        ui_state.show_json = !ui_state.show_json;
                    }
                });
            });

        if ui_state.show_json
            && let Some(document) = session.document()
        {
            match to_pretty_json(document) {
                Ok(text) => {
                    egui::Window::new("JSON")
                        .default_size([480.0, 520.0])
                        .show(ctx, |ui| {
                            if ui.button("Copy").clicked() {
                                actions.push(UiAction::Copy(text.clone()));
                            }
                            egui::ScrollArea::vertical().show(ui, |ui| {
                                ui.monospace(&text);
                            });
                        });
                }
                Err(err) => warn!(error = %err, "序列化 JSON 失败"),
            }
        }
    }

    for action in actions {
        match action {
            UiAction::Copy(text) => {
                ctx.copy_text(text);
                state.ui.feedback = Some(COPY_CONFIRMATION.to_string());
            }
            other => apply_action(&mut state, other),
        }
    }
}

struct EntryRow<'a> {
    category: &'a str,
    index: usize,
    count: usize,
    entry: &'a Value,
}

fn entry_row(
    ui: &mut egui::Ui,
    row: EntryRow<'_>,
    edits: &mut EditBuffer,
    actions: &mut Vec<UiAction>,
) {
    let EntryRow {
        category,
        index,
        count,
        entry,
    } = row;
    ui.group(|ui| {
        ui.horizontal(|ui| {
            ui.strong(format!("#{}", index + 1));
            if ui.add_enabled(index > 0, egui::Button::new("⬆")).clicked() {
                actions.push(move_request(index, index - 1));
            }
            if ui.add_enabled(index + 1 < count, egui::Button::new("⬇")).clicked() {
                actions.push(move_request(index, index + 1));
            }
            if ui.button("Remove").clicked() {
                actions.push(UiAction::Command(CommandRequest::new(
                    "remove",
                    [index.to_string()],
                )));
            }
        });
        let Some(object) = entry.as_object() else {
            ui.monospace(entry.to_string());
            return;
        };
        for (key, value) in object {
            ui.horizontal(|ui| {
                ui.label(key.as_str());
                if key == CUSTOM_OPTIONS_KEY {
                    ui.monospace(value.to_string());
                    return;
                }
                let field_key = FieldKey::entry(category, index, key);
                let mut text = edits.text(&field_key, Some(value));
                let field = ui.add(egui::TextEdit::singleline(&mut text).desired_width(120.0));
                if field.changed() {
                    edits.update(field_key.clone(), text.clone());
                    actions.push(UiAction::Command(CommandRequest::new(
                        "edit",
                        [index.to_string(), key.clone(), text],
                    )));
                }
                if field.lost_focus() {
                    edits.release(&field_key);
                }
            });
        }
    });
}

fn apply_action(state: &mut EditorState, action: UiAction) {
    match action {
        UiAction::Command(request) => {
            // 条目位置或分类变化后，旧缓冲不再对应同一字段。
            if matches!(
                request.name.as_str(),
                "select" | "deselect" | "insert" | "remove" | "move"
            ) {
                state.ui.edits.clear();
            }
            state.dispatch(&request);
        }
        UiAction::ApplyOffset => {
            state.dispatch(&CommandRequest::new("apply_offset", Vec::<String>::new()));
            state.ui.offset_inputs = ["0".to_string(), "0".to_string(), "0".to_string()];
        }
        UiAction::OpenFile => {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("JSON", &["json"])
                .pick_file()
            {
                let EditorState {
                    session,
                    ingestor,
                    ui,
                    ..
                } = state;
                ingestor.ingest_file(session, &path);
                ui.edits.clear();
                ui.feedback = session.error().map(str::to_string);
            }
        }
        UiAction::Fetch => {
            let input = state.ui.url_input.trim().to_string();
            if input.is_empty() {
                return;
            }
            let ingestor = Arc::clone(&state.ingestor);
            let (sender, receiver) = mpsc::channel();
            let url = input.clone();
            std::thread::spawn(move || {
                let _ = sender.send(ingestor.fetch_remote(&url));
            });
            state.pending_fetch = Some(PendingFetch {
                input,
                receiver: Mutex::new(receiver),
            });
        }
        UiAction::LoadPaste => {
            let EditorState {
                session,
                ingestor,
                ui,
                ..
            } = state;
            ingestor.ingest_paste(session, &ui.paste_input);
            ui.edits.clear();
            ui.feedback = session.error().map(str::to_string);
        }
        UiAction::Download => {
            let Some(document) = state.session.document() else {
                return;
            };
            let target = state.export.default_target();
            state.ui.feedback = Some(match JsonFacade::new().save(document, &target) {
                Ok(()) => {
                    info!(path = %target.display(), "导出 JSON");
                    format!("Saved {}", target.display())
                }
                Err(err) => {
                    warn!(path = %target.display(), error = %err, "导出失败");
                    err.to_string()
                }
            });
        }
        UiAction::Copy(_) => {}
    }
}

fn set_request(parameter: MapParameter, value: String) -> UiAction {
    UiAction::Command(CommandRequest::new(
        "set",
        [parameter.key().to_string(), value],
    ))
}

fn move_request(from: usize, to: usize) -> UiAction {
    UiAction::Command(CommandRequest::new(
        "move",
        [from.to_string(), to.to_string()],
    ))
}

fn point_to_vec3(point: Point3) -> Vec3 {
    point.as_vec3().as_vec3()
}
