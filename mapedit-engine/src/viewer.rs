use glam::DVec3;
use mapedit_core::document::Entry;
use mapedit_core::geometry::{Bounds3D, Point3};
use serde_json::Value;
use tracing::{debug, trace};

use crate::session::{Session, ViewMode};

pub const DEFAULT_FOV_DEGREES: f64 = 75.0;
/// 与常见光线拾取库的点云默认阈值一致（世界单位）。
pub const DEFAULT_PICK_THRESHOLD: f64 = 1.0;

const NEAR_PLANE: f64 = 0.1;
const MIN_FAR_PLANE: f64 = 1_000.0;
const MIN_FRAMING_DISTANCE: f64 = 10.0;

/// 选中分类条目在渲染空间中的点集，每个条目对应一个点，顺序与条目一致。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointCloud {
    points: Vec<Point3>,
}

impl PointCloud {
    pub fn from_entries(entries: &[Value], mode: ViewMode) -> Self {
        let points = entries
            .iter()
            .map(|entry| {
                let position = Entry::from_value(entry).position();
                match mode {
                    ViewMode::Spatial => position,
                    ViewMode::Flat => position.flatten(),
                }
            })
            .collect();
        Self { points }
    }

    #[inline]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounds(&self) -> Bounds3D {
        Bounds3D::from_points(self.points.iter().copied())
    }
}

/// 透视相机的取景结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFraming {
    pub position: Point3,
    pub target: Point3,
    pub fov_degrees: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl CameraFraming {
    /// 根据点集包围盒与视场角自动取景：相机沿 +Z 方向后退到恰好容纳最大边长的位置，并对准包围盒中心。
    pub fn fit(cloud: &PointCloud, fov_degrees: f64, aspect: f64) -> Self {
        let bounds = cloud.bounds();
        let center = bounds.center();
        let max_dim = bounds.max_extent();
        let half_fov = fov_degrees.to_radians() / 2.0;
        let mut distance = (max_dim / 2.0 / half_fov.tan()).abs();
        if !distance.is_finite() || distance < f64::EPSILON {
            distance = MIN_FRAMING_DISTANCE;
        }
        let far = (4.0 * (distance + max_dim)).max(MIN_FAR_PLANE);

        Self {
            position: Point3::new(center.x(), center.y(), center.z() + distance),
            target: center,
            fov_degrees,
            aspect,
            near: NEAR_PLANE,
            far,
        }
    }

    #[inline]
    pub fn distance(&self) -> f64 {
        self.position.as_vec3().distance(self.target.as_vec3())
    }
}

/// 视口内的指针像素坐标，原点在左上角。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    #[inline]
    pub fn aspect(self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// 像素坐标转换为标准化设备坐标 [-1, 1]，Y 轴向上。
    pub fn to_ndc(self, pointer: PointerPosition) -> Option<(f64, f64)> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let x = (pointer.x / self.width) * 2.0 - 1.0;
        let y = -(pointer.y / self.height) * 2.0 + 1.0;
        Some((x, y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    pub fn from_camera(framing: &CameraFraming, ndc_x: f64, ndc_y: f64) -> Option<Ray> {
        let origin = framing.position.as_vec3();
        let forward = (framing.target.as_vec3() - origin).try_normalize()?;
        let right = forward.cross(DVec3::Y).try_normalize()?;
        let up = right.cross(forward);
        let tan_half = (framing.fov_degrees.to_radians() / 2.0).tan();
        let direction = (forward
            + right * (ndc_x * tan_half * framing.aspect)
            + up * (ndc_y * tan_half))
            .try_normalize()?;
        Some(Ray { origin, direction })
    }

    #[inline]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

/// 返回射线命中的最近点索引（0 起）。点到射线的垂直距离不超过 `threshold` 视为命中，
/// 多个命中按沿射线的距离排序。
pub fn pick_nearest(ray: &Ray, points: &[Point3], threshold: f64) -> Option<usize> {
    let threshold_sq = threshold * threshold;
    let mut best: Option<(usize, f64)> = None;
    for (index, point) in points.iter().enumerate() {
        let target = point.as_vec3();
        let t = (target - ray.origin).dot(ray.direction).max(0.0);
        let closest = ray.at(t);
        if closest.distance_squared(target) > threshold_sq {
            continue;
        }
        if best.is_none_or(|(_, best_t)| t < best_t) {
            best = Some((index, t));
        }
    }
    best.map(|(index, _)| index)
}

/// 渲染库的窄接口：构建场景、释放资源与指针拾取。
pub trait SceneBackend {
    type Handle;

    fn build(&mut self, cloud: &PointCloud, framing: &CameraFraming) -> Self::Handle;
    fn dispose(&mut self, handle: Self::Handle);
    fn pick(&self, handle: &Self::Handle, pointer: PointerPosition) -> Option<usize>;
}

/// 无窗口后端：只保存点集与相机，用数学射线完成拾取。CLI 与测试使用该实现。
#[derive(Debug)]
pub struct RaycastScene {
    viewport: ViewportSize,
    threshold: f64,
    live_handles: usize,
}

#[derive(Debug)]
pub struct RaycastHandle {
    cloud: PointCloud,
    framing: CameraFraming,
}

impl RaycastScene {
    pub fn new(viewport: ViewportSize, threshold: f64) -> Self {
        Self {
            viewport,
            threshold,
            live_handles: 0,
        }
    }

    #[inline]
    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: ViewportSize) {
        self.viewport = viewport;
    }

    /// 尚未释放的场景数量。
    #[inline]
    pub fn live_handles(&self) -> usize {
        self.live_handles
    }
}

impl SceneBackend for RaycastScene {
    type Handle = RaycastHandle;

    fn build(&mut self, cloud: &PointCloud, framing: &CameraFraming) -> RaycastHandle {
        self.live_handles += 1;
        RaycastHandle {
            cloud: cloud.clone(),
            framing: *framing,
        }
    }

    fn dispose(&mut self, handle: RaycastHandle) {
        self.live_handles = self.live_handles.saturating_sub(1);
        drop(handle);
    }

    fn pick(&self, handle: &RaycastHandle, pointer: PointerPosition) -> Option<usize> {
        let (ndc_x, ndc_y) = self.viewport.to_ndc(pointer)?;
        let ray = Ray::from_camera(&handle.framing, ndc_x, ndc_y)?;
        pick_nearest(&ray, handle.cloud.points(), self.threshold)
    }
}

/// 决定是否重建场景的键：选中分类、维度模式或该分类的条目内容任一变化都会重建。
/// 其他分类和顶层参数的编辑不影响当前场景。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelKey {
    pub category: String,
    pub mode: ViewMode,
    pub entries: Vec<Value>,
}

impl PanelKey {
    fn matches(&self, category: &str, mode: ViewMode, entries: &[Value]) -> bool {
        self.category == category && self.mode == mode && self.entries == entries
    }
}

struct MountedScene<H> {
    key: PanelKey,
    handle: H,
    framing: CameraFraming,
    point_count: usize,
}

/// 点云面板。不保存任何逐点状态，每次重建前都会释放旧场景。
pub struct VisualizationPanel<B: SceneBackend> {
    backend: B,
    fov_degrees: f64,
    aspect: f64,
    mounted: Option<MountedScene<B::Handle>>,
    hovered: Option<usize>,
}

impl<B: SceneBackend> VisualizationPanel<B> {
    pub fn new(backend: B, fov_degrees: f64, aspect: f64) -> Self {
        Self {
            backend,
            fov_degrees,
            aspect,
            mounted: None,
            hovered: None,
        }
    }

    /// 使面板与会话保持一致，返回本次是否重建了场景。
    ///
    /// 未载入文档或未选中分类时卸载面板。
    pub fn sync(&mut self, session: &Session) -> bool {
        let (Some(category), Ok(entries)) =
            (session.selected_category(), session.selected_entries())
        else {
            self.unmount();
            return false;
        };
        let mode = session.view_mode();
        if self
            .mounted
            .as_ref()
            .is_some_and(|mounted| mounted.key.matches(category, mode, entries))
        {
            return false;
        }
        let key = PanelKey {
            category: category.to_string(),
            mode,
            entries: entries.to_vec(),
        };

        self.unmount();
        let cloud = PointCloud::from_entries(entries, key.mode);
        let framing = CameraFraming::fit(&cloud, self.fov_degrees, self.aspect);
        debug!(
            category = %key.category,
            points = cloud.len(),
            distance = framing.distance(),
            "重建点云场景"
        );
        let handle = self.backend.build(&cloud, &framing);
        self.mounted = Some(MountedScene {
            key,
            handle,
            framing,
            point_count: cloud.len(),
        });
        true
    }

    /// 更新悬停点，返回 1 起的点序号；未命中时清空。
    pub fn hover(&mut self, pointer: PointerPosition) -> Option<usize> {
        self.hovered = self
            .mounted
            .as_ref()
            .and_then(|mounted| self.backend.pick(&mounted.handle, pointer))
            .map(|index| index + 1);
        trace!(x = pointer.x, y = pointer.y, hovered = ?self.hovered, "指针拾取");
        self.hovered
    }

    #[inline]
    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn hover_label(&self) -> Option<String> {
        self.hovered.map(|number| format!("Point #{number}"))
    }

    pub fn framing(&self) -> Option<&CameraFraming> {
        self.mounted.as_ref().map(|mounted| &mounted.framing)
    }

    pub fn point_count(&self) -> usize {
        self.mounted.as_ref().map_or(0, |mounted| mounted.point_count)
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        if (self.aspect - aspect).abs() > f64::EPSILON {
            self.aspect = aspect;
            // 取景依赖宽高比，下一次 sync 时重建。
            self.unmount();
        }
    }

    /// 释放当前场景与悬停状态。
    pub fn unmount(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            self.backend.dispose(mounted.handle);
        }
        self.hovered = None;
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: SceneBackend> Drop for VisualizationPanel<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use mapedit_core::document::{Document, EntryField, MapParameter};
    use serde_json::json;

    use super::*;

    fn session_with(entries: Value) -> Session {
        let document = Document::from_value(json!({
            "name": "viewer",
            "deathHeight": 0,
            "locations": { "points": entries, "other": [] }
        }))
        .unwrap();
        let mut session = Session::new();
        session.load_document(document, "test");
        session.select_category(Some("points")).unwrap();
        session
    }

    #[derive(Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
        next: usize,
    }

    impl SceneBackend for Recorder {
        type Handle = usize;

        fn build(&mut self, cloud: &PointCloud, _framing: &CameraFraming) -> usize {
            self.next += 1;
            self.events
                .borrow_mut()
                .push(format!("build#{}:{}", self.next, cloud.len()));
            self.next
        }

        fn dispose(&mut self, handle: usize) {
            self.events.borrow_mut().push(format!("dispose#{handle}"));
        }

        fn pick(&self, _handle: &usize, _pointer: PointerPosition) -> Option<usize> {
            Some(0)
        }
    }

    #[test]
    fn flat_mode_zeroes_vertical_axis() {
        let entries = [json!({"x": 1, "y": 64, "z": -3}), json!({"x": "2", "y": 10, "z": 4})];
        let cloud = PointCloud::from_entries(&entries, ViewMode::Flat);
        assert_eq!(
            cloud.points(),
            [Point3::new(1.0, 0.0, -3.0), Point3::new(2.0, 0.0, 4.0)]
        );
        let spatial = PointCloud::from_entries(&entries, ViewMode::Spatial);
        assert_eq!(spatial.points()[0], Point3::new(1.0, 64.0, -3.0));
    }

    #[test]
    fn framing_fits_largest_extent() {
        let entries = [json!({"x": -10, "y": 0, "z": 0}), json!({"x": 10, "y": 4, "z": 2})];
        let cloud = PointCloud::from_entries(&entries, ViewMode::Spatial);
        let framing = CameraFraming::fit(&cloud, 90.0, 2.0);
        // maxDim = 20，tan(45°) = 1 → 距离 10。
        assert!((framing.distance() - 10.0).abs() < 1e-9);
        assert_eq!(framing.target, Point3::new(0.0, 2.0, 1.0));
        let offset = framing.position.as_vec3() - DVec3::new(0.0, 2.0, 11.0);
        assert!(offset.length() < 1e-9, "相机位置偏差过大: {:?}", framing.position);
        assert!(framing.far >= MIN_FAR_PLANE);
    }

    #[test]
    fn degenerate_cloud_uses_minimum_distance() {
        let single = PointCloud::from_entries(&[json!({"x": 5, "y": 5, "z": 5})], ViewMode::Spatial);
        let framing = CameraFraming::fit(&single, DEFAULT_FOV_DEGREES, 1.0);
        assert!((framing.distance() - MIN_FRAMING_DISTANCE).abs() < 1e-9);

        let empty = CameraFraming::fit(&PointCloud::default(), DEFAULT_FOV_DEGREES, 1.0);
        assert_eq!(empty.target, Point3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn center_ray_picks_nearest_point() {
        let entries = [
            json!({"x": 0, "y": 0, "z": 0}),
            json!({"x": 20, "y": 0, "z": 0}),
            json!({"x": 0, "y": 0, "z": 5}),
        ];
        let cloud = PointCloud::from_entries(&entries, ViewMode::Spatial);
        let framing = CameraFraming::fit(&cloud, DEFAULT_FOV_DEGREES, 2.0);
        let mut scene = RaycastScene::new(
            ViewportSize {
                width: 800.0,
                height: 400.0,
            },
            DEFAULT_PICK_THRESHOLD,
        );
        let handle = scene.build(&cloud, &framing);
        let ray = Ray::from_camera(&framing, 0.0, 0.0).unwrap();
        // 射线穿过中心 (10, 0, 2.5)，不会命中任何点。
        assert_eq!(pick_nearest(&ray, cloud.points(), DEFAULT_PICK_THRESHOLD), None);

        let aimed = Ray {
            origin: DVec3::new(0.0, 0.0, 50.0),
            direction: DVec3::NEG_Z,
        };
        assert_eq!(pick_nearest(&aimed, cloud.points(), 0.5), Some(2));

        assert_eq!(
            scene.pick(&handle, PointerPosition { x: 0.0, y: 0.0 }),
            None
        );
        scene.dispose(handle);
        assert_eq!(scene.live_handles(), 0);
    }

    #[test]
    fn pointer_maps_to_ndc() {
        let viewport = ViewportSize {
            width: 800.0,
            height: 400.0,
        };
        assert_eq!(
            viewport.to_ndc(PointerPosition { x: 400.0, y: 200.0 }),
            Some((0.0, 0.0))
        );
        assert_eq!(
            viewport.to_ndc(PointerPosition { x: 0.0, y: 0.0 }),
            Some((-1.0, 1.0))
        );
        let collapsed = ViewportSize {
            width: 0.0,
            height: 400.0,
        };
        assert!(collapsed.to_ndc(PointerPosition { x: 1.0, y: 1.0 }).is_none());
    }

    #[test]
    fn hovering_the_projected_point_reports_its_number() {
        let mut session = session_with(json!([
            {"x": -30, "y": 0, "z": 0},
            {"x": 30, "y": 0, "z": 0}
        ]));
        session.set_view_mode(ViewMode::Flat);
        let viewport = ViewportSize {
            width: 800.0,
            height: 400.0,
        };
        let mut panel = VisualizationPanel::new(
            RaycastScene::new(viewport, DEFAULT_PICK_THRESHOLD),
            DEFAULT_FOV_DEGREES,
            viewport.aspect(),
        );
        assert!(panel.sync(&session));

        let framing = *panel.framing().unwrap();
        let tan_half = (DEFAULT_FOV_DEGREES.to_radians() / 2.0).tan();
        // 第二个点在相机坐标系中的水平 NDC。
        let ndc_x = 30.0 / (framing.distance() * tan_half * viewport.aspect());
        let pixel_x = (ndc_x + 1.0) / 2.0 * viewport.width;
        let hit = panel.hover(PointerPosition {
            x: pixel_x,
            y: viewport.height / 2.0,
        });
        assert_eq!(hit, Some(2));
        assert_eq!(panel.hover_label().as_deref(), Some("Point #2"));

        assert_eq!(panel.hover(PointerPosition { x: 400.0, y: 10.0 }), None);
        assert!(panel.hover_label().is_none());
    }

    #[test]
    fn edits_outside_selected_category_keep_scene() {
        let mut session = session_with(json!([{"x": 1, "y": 2, "z": 3, "yaw": 0}]));
        let viewport = ViewportSize {
            width: 800.0,
            height: 400.0,
        };
        let mut panel = VisualizationPanel::new(
            RaycastScene::new(viewport, DEFAULT_PICK_THRESHOLD),
            DEFAULT_FOV_DEGREES,
            viewport.aspect(),
        );
        assert!(panel.sync(&session));

        session.set_parameter(MapParameter::Name, "renamed").unwrap();
        session.set_parameter(MapParameter::DeathHeight, "-80").unwrap();
        session.insert_entry("other", None).unwrap();
        assert!(!panel.sync(&session));
        assert_eq!(panel.backend().live_handles(), 1);

        session
            .edit_entry_field("points", 0, &EntryField::X, "7")
            .unwrap();
        assert!(panel.sync(&session));
        assert_eq!(panel.backend().live_handles(), 1);
    }

    #[test]
    fn panel_tears_down_before_each_rebuild() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let recorder = Recorder {
            events: Rc::clone(&events),
            next: 0,
        };
        let mut session = session_with(json!([{"x": 1, "y": 2, "z": 3}]));
        {
            let mut panel = VisualizationPanel::new(recorder, DEFAULT_FOV_DEGREES, 1.0);
            assert!(panel.sync(&session));
            // 无变化不重建。
            assert!(!panel.sync(&session));

            session.insert_entry("points", None).unwrap();
            assert!(panel.sync(&session));

            session.set_view_mode(ViewMode::Flat);
            assert!(panel.sync(&session));
            assert_eq!(panel.hover(PointerPosition { x: 0.0, y: 0.0 }), Some(1));

            session.clear_selection();
            assert!(!panel.sync(&session));
            assert!(!panel.is_mounted());
            assert!(panel.hovered().is_none());

            session.select_category(Some("points")).unwrap();
            assert!(panel.sync(&session));
        }
        assert_eq!(
            *events.borrow(),
            [
                "build#1:1",
                "dispose#1",
                "build#2:2",
                "dispose#2",
                "build#3:2",
                "dispose#3",
                "build#4:2",
                "dispose#4",
            ]
        );
    }
}
