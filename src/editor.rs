// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Interactive curve editor session.
//!
//! Pointer events go through the [`GestureClassifier`]; each gesture becomes
//! zero or more [`EditIntent`]s, and [`CurveEditor::apply`] is the only place
//! the edited profile changes. The session owns its copy of the profile
//! exclusively; the control loop only sees it once it is saved to the store.

use crate::canvas::Canvas;
use crate::curve;
use crate::gesture::{Gesture, GestureClassifier};
use crate::point::{FanPoint, GRID_STEP};
use crate::profile::{FanProfile, ModeKind, clamp_speed};
use std::time::Instant;

/// Domain distance within which a press hits an existing curve point.
pub const POINT_PROXIMITY: f64 = 5.0;

/// Speed band (percent) around the fixed-speed line that can be grabbed.
pub const FIXED_LINE_TOLERANCE: f64 = 5.0;

/// A single change to the edited profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditIntent {
    AddPoint(FanPoint),
    DeletePoint(usize),
    MovePoint(usize, FanPoint),
    SelectPoint(Option<usize>),
    SetFixedSpeed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragTarget {
    Point(usize),
    FixedLine,
}

/// What a display mark stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    Curve { index: usize, selected: bool },
    /// Last measured sample
    Now,
    /// Last commanded sample
    Set,
}

/// Everything the UI needs to draw one point and its label.
#[derive(Debug, Clone, PartialEq)]
pub struct PointMark {
    pub kind: MarkKind,
    pub point: FanPoint,
    pub x: f64,
    pub y: f64,
    pub label: String,
    pub label_dx: f64,
    pub label_dy: f64,
}

/// One open editor on one profile.
#[derive(Debug)]
pub struct CurveEditor {
    name: String,
    profile: FanProfile,
    canvas: Canvas,
    gestures: GestureClassifier,
    selected: Option<usize>,
    grabbed: Option<DragTarget>,
}

impl CurveEditor {
    pub fn new(name: impl Into<String>, mut profile: FanProfile, canvas: Canvas) -> Self {
        curve::sort_points(&mut profile.points);
        Self {
            name: name.into(),
            profile,
            canvas,
            gestures: GestureClassifier::new(),
            selected: None,
            grabbed: None,
        }
    }

    // -----------------------------------------------------------------------
    // Pointer entry points
    // -----------------------------------------------------------------------

    pub fn pointer_down(&mut self, x: f64, y: f64, at: Instant) {
        let pos = self.canvas.from_canvas(x, y);
        self.grabbed = self.drag_target(&pos);
        self.gestures.pointer_down(x, y, at, self.grabbed.is_some());
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Vec<EditIntent> {
        let gesture = self.gestures.pointer_move(x, y);
        self.handle(gesture)
    }

    pub fn pointer_up(&mut self, x: f64, y: f64, at: Instant) -> Vec<EditIntent> {
        let gesture = self.gestures.pointer_up(x, y, at);
        self.handle(gesture)
    }

    pub fn pointer_leave(&mut self) -> Vec<EditIntent> {
        let gesture = self.gestures.pointer_leave();
        self.grabbed = None;
        self.handle(gesture)
    }

    /// Drive long-hold detection while the pointer stays down.
    pub fn poll(&mut self, now: Instant) -> Vec<EditIntent> {
        let gesture = self.gestures.poll(now);
        self.handle(gesture)
    }

    fn handle(&mut self, gesture: Option<Gesture>) -> Vec<EditIntent> {
        let Some(gesture) = gesture else {
            return Vec::new();
        };
        let intents = self.intents_for(gesture);
        for intent in &intents {
            self.apply(*intent);
        }
        intents
    }

    /// Translate a gesture into intents against the current state.
    fn intents_for(&mut self, gesture: Gesture) -> Vec<EditIntent> {
        match gesture {
            Gesture::Tap { x, y } => {
                let pos = self.canvas.from_canvas(x, y);
                match self.profile.mode {
                    ModeKind::NoControl => Vec::new(),
                    ModeKind::Fixed => vec![EditIntent::SetFixedSpeed(pos.speed_pct)],
                    ModeKind::Curve => match self.nearest_point(&pos) {
                        Some(i) if self.selected == Some(i) => {
                            vec![EditIntent::SelectPoint(None), EditIntent::DeletePoint(i)]
                        }
                        Some(i) => vec![EditIntent::DeletePoint(i)],
                        None => vec![EditIntent::AddPoint(pos)],
                    },
                }
            }
            Gesture::LongPress { x, y } => {
                let pos = self.canvas.from_canvas(x, y);
                match self.profile.mode {
                    ModeKind::NoControl => Vec::new(),
                    ModeKind::Fixed => vec![EditIntent::SetFixedSpeed(pos.speed_pct)],
                    ModeKind::Curve => self
                        .nearest_point(&pos)
                        .map(|i| vec![EditIntent::SelectPoint(Some(i))])
                        .unwrap_or_default(),
                }
            }
            Gesture::DragStart { x, y } | Gesture::DragMove { x, y } => {
                let pos = self.canvas.from_canvas(x, y);
                match self.grabbed {
                    Some(DragTarget::Point(i)) => vec![EditIntent::MovePoint(i, pos)],
                    Some(DragTarget::FixedLine) => vec![EditIntent::SetFixedSpeed(pos.speed_pct)],
                    None => Vec::new(),
                }
            }
            Gesture::DragEnd | Gesture::DragCancel => {
                self.grabbed = None;
                Vec::new()
            }
        }
    }

    fn drag_target(&self, pos: &FanPoint) -> Option<DragTarget> {
        match self.profile.mode {
            ModeKind::NoControl => None,
            ModeKind::Fixed => {
                let gap = (pos.speed_pct - self.profile.fixed_speed).abs();
                (gap <= FIXED_LINE_TOLERANCE).then_some(DragTarget::FixedLine)
            }
            ModeKind::Curve => self.nearest_point(pos).map(DragTarget::Point),
        }
    }

    /// Index of the closest point within [`POINT_PROXIMITY`] of `pos`.
    fn nearest_point(&self, pos: &FanPoint) -> Option<usize> {
        self.profile
            .points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_close(pos, POINT_PROXIMITY))
            .min_by(|(_, a), (_, b)| a.distance(pos).total_cmp(&b.distance(pos)))
            .map(|(i, _)| i)
    }

    // -----------------------------------------------------------------------
    // Reducer
    // -----------------------------------------------------------------------

    /// Apply one intent. Out-of-range indices are ignored.
    pub fn apply(&mut self, intent: EditIntent) {
        let len = self.profile.points.len();
        match intent {
            EditIntent::AddPoint(p) => {
                let p = self.grid(p);
                self.profile.points.push(p);
                self.normalize();
            }
            EditIntent::DeletePoint(i) if i < len => {
                self.profile.points.remove(i);
                self.selected = shift_after_delete(self.selected, i);
                self.grabbed = match self.grabbed {
                    Some(DragTarget::Point(g)) => shift_after_delete(Some(g), i).map(DragTarget::Point),
                    other => other,
                };
            }
            EditIntent::MovePoint(i, p) if i < len => {
                self.profile.points[i] = self.grid(p);
                self.normalize();
            }
            EditIntent::SelectPoint(sel) => {
                self.selected = sel.filter(|&i| i < len);
            }
            EditIntent::SetFixedSpeed(speed) => {
                let speed = clamp_speed(speed);
                self.profile.fixed_speed = if self.profile.snap_to_grid {
                    (speed / GRID_STEP).round() * GRID_STEP
                } else {
                    speed
                };
            }
            EditIntent::DeletePoint(i) | EditIntent::MovePoint(i, _) => {
                log::debug!("Ignoring edit of missing point {i}");
            }
        }
    }

    fn grid(&self, p: FanPoint) -> FanPoint {
        if self.profile.snap_to_grid { p.snapped() } else { p }
    }

    /// Restore evaluation order, keeping selection and drag on the same
    /// logical points.
    fn normalize(&mut self) {
        let points = &self.profile.points;
        let mut order: Vec<usize> = (0..points.len()).collect();
        order.sort_by(|&a, &b| curve::point_order(&points[a], &points[b]));

        let remap = |old: usize| order.iter().position(|&i| i == old);
        self.selected = self.selected.and_then(remap);
        self.grabbed = match self.grabbed {
            Some(DragTarget::Point(g)) => remap(g).map(DragTarget::Point),
            other => other,
        };

        let sorted: Vec<FanPoint> = order.iter().map(|&i| points[i]).collect();
        self.profile.points = sorted;
    }

    // -----------------------------------------------------------------------
    // Imperative setters
    // -----------------------------------------------------------------------

    pub fn set_mode(&mut self, mode: ModeKind) {
        self.profile.mode = mode;
        self.grabbed = None;
    }

    pub fn set_fixed_speed(&mut self, speed_pct: f64) {
        self.apply(EditIntent::SetFixedSpeed(speed_pct));
    }

    pub fn set_snap_to_grid(&mut self, snap: bool) {
        self.profile.snap_to_grid = snap;
    }

    /// Set the selected point's temperature. Returns false with no selection.
    pub fn set_selected_temperature(&mut self, temp_c: f64) -> bool {
        match self.selected_point() {
            Some(p) => self.move_selected(FanPoint::new(temp_c, p.speed_pct)),
            None => false,
        }
    }

    /// Set the selected point's speed. Returns false with no selection.
    pub fn set_selected_speed(&mut self, speed_pct: f64) -> bool {
        match self.selected_point() {
            Some(p) => self.move_selected(FanPoint::new(p.temp_c, speed_pct)),
            None => false,
        }
    }

    fn move_selected(&mut self, p: FanPoint) -> bool {
        let Some(i) = self.selected else {
            return false;
        };
        self.apply(EditIntent::MovePoint(i, p));
        true
    }

    pub fn clear_selection(&mut self) {
        self.apply(EditIntent::SelectPoint(None));
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &FanProfile {
        &self.profile
    }

    pub fn points(&self) -> &[FanPoint] {
        &self.profile.points
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_point(&self) -> Option<FanPoint> {
        self.selected.and_then(|i| self.profile.points.get(i).copied())
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Resize the drawing surface.
    pub fn set_canvas(&mut self, canvas: Canvas) {
        self.canvas = canvas;
    }

    /// Display marks for the curve points plus optional live samples.
    pub fn marks(&self, now: Option<FanPoint>, set: Option<FanPoint>) -> Vec<PointMark> {
        let curve_marks = self.profile.points.iter().enumerate().map(|(index, p)| {
            let selected = self.selected == Some(index);
            (MarkKind::Curve { index, selected }, *p)
        });
        let live = [(MarkKind::Now, now), (MarkKind::Set, set)]
            .into_iter()
            .filter_map(|(kind, p)| p.map(|p| (kind, p)));

        curve_marks
            .chain(live)
            .map(|(kind, point)| {
                let (x, y) = self.canvas.to_canvas(&point);
                let (label_dx, label_dy) = self.canvas.label_offset(x, y);
                PointMark {
                    kind,
                    point,
                    x,
                    y,
                    label: format!("{:.0}°C {:.0}%", point.temp_c, point.speed_pct),
                    label_dx,
                    label_dy,
                }
            })
            .collect()
    }

    /// Close the session, yielding the name and profile to store.
    pub fn finish(mut self) -> (String, FanProfile) {
        curve::sort_points(&mut self.profile.points);
        (self.name, self.profile)
    }
}

fn shift_after_delete(index: Option<usize>, deleted: usize) -> Option<usize> {
    match index {
        Some(i) if i == deleted => None,
        Some(i) if i > deleted => Some(i - 1),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // 200x200 surface: 2 units per degree and per percent.
    fn editor(profile: FanProfile) -> CurveEditor {
        CurveEditor::new("test", profile, Canvas::new(200.0, 200.0))
    }

    fn tap(ed: &mut CurveEditor, x: f64, y: f64) -> Vec<EditIntent> {
        let t0 = Instant::now();
        ed.pointer_down(x, y, t0);
        ed.pointer_up(x + 1.0, y, t0 + Duration::from_millis(150))
    }

    fn long_press(ed: &mut CurveEditor, x: f64, y: f64) -> Vec<EditIntent> {
        let t0 = Instant::now();
        ed.pointer_down(x, y, t0);
        ed.pointer_up(x, y, t0 + Duration::from_millis(1200))
    }

    #[test]
    fn test_tap_adds_then_removes() {
        let mut ed = editor(FanProfile::curve(Vec::new()));

        let intents = tap(&mut ed, 80.0, 100.0);
        assert_eq!(intents, vec![EditIntent::AddPoint(FanPoint::new(40.0, 50.0))]);
        assert_eq!(ed.points(), &[FanPoint::new(40.0, 50.0)]);

        let intents = tap(&mut ed, 82.0, 98.0);
        assert_eq!(intents, vec![EditIntent::DeletePoint(0)]);
        assert!(ed.points().is_empty());
    }

    #[test]
    fn test_added_points_stay_sorted() {
        let mut ed = editor(FanProfile::curve(Vec::new()));
        tap(&mut ed, 160.0, 20.0);
        tap(&mut ed, 40.0, 180.0);
        tap(&mut ed, 100.0, 100.0);
        let temps: Vec<f64> = ed.points().iter().map(|p| p.temp_c).collect();
        assert_eq!(temps, vec![20.0, 50.0, 80.0]);
    }

    #[test]
    fn test_long_press_selects_and_tap_deletes_selected() {
        let mut ed = editor(FanProfile::curve(vec![
            FanPoint::new(30.0, 20.0),
            FanPoint::new(60.0, 70.0),
        ]));

        let intents = long_press(&mut ed, 120.0, 60.0);
        assert_eq!(intents, vec![EditIntent::SelectPoint(Some(1))]);
        assert_eq!(ed.selected_point(), Some(FanPoint::new(60.0, 70.0)));

        let intents = tap(&mut ed, 120.0, 60.0);
        assert_eq!(
            intents,
            vec![EditIntent::SelectPoint(None), EditIntent::DeletePoint(1)]
        );
        assert_eq!(ed.selected(), None);
        assert_eq!(ed.points(), &[FanPoint::new(30.0, 20.0)]);
    }

    #[test]
    fn test_deleting_earlier_point_shifts_selection() {
        let mut ed = editor(FanProfile::curve(vec![
            FanPoint::new(30.0, 20.0),
            FanPoint::new(60.0, 70.0),
        ]));
        ed.apply(EditIntent::SelectPoint(Some(1)));
        tap(&mut ed, 60.0, 160.0);
        assert_eq!(ed.selected(), Some(0));
        assert_eq!(ed.selected_point(), Some(FanPoint::new(60.0, 70.0)));
    }

    #[test]
    fn test_long_hold_reported_by_poll() {
        let mut ed = editor(FanProfile::curve(vec![FanPoint::new(50.0, 50.0)]));
        let t0 = Instant::now();
        ed.pointer_down(100.0, 100.0, t0);
        assert!(ed.poll(t0 + Duration::from_millis(300)).is_empty());
        assert_eq!(
            ed.poll(t0 + Duration::from_millis(1100)),
            vec![EditIntent::SelectPoint(Some(0))]
        );
        assert!(ed.pointer_up(100.0, 100.0, t0 + Duration::from_millis(1300)).is_empty());
        assert_eq!(ed.points().len(), 1);
    }

    #[test]
    fn test_drag_moves_point_past_neighbour() {
        let mut ed = editor(FanProfile::curve(vec![
            FanPoint::new(30.0, 20.0),
            FanPoint::new(60.0, 70.0),
        ]));
        ed.apply(EditIntent::SelectPoint(Some(0)));

        let t0 = Instant::now();
        ed.pointer_down(60.0, 160.0, t0);
        ed.pointer_move(100.0, 160.0);
        ed.pointer_move(160.0, 160.0);
        // Dragged point is now second; keep moving it.
        ed.pointer_move(180.0, 140.0);
        assert!(ed.pointer_up(180.0, 140.0, t0 + Duration::from_millis(2000)).is_empty());

        assert_eq!(
            ed.points(),
            &[FanPoint::new(60.0, 70.0), FanPoint::new(90.0, 30.0)]
        );
        assert_eq!(ed.selected(), Some(1));
    }

    #[test]
    fn test_leave_keeps_last_drag_position() {
        let mut ed = editor(FanProfile::curve(vec![FanPoint::new(50.0, 50.0)]));
        let t0 = Instant::now();
        ed.pointer_down(100.0, 100.0, t0);
        ed.pointer_move(120.0, 100.0);
        ed.pointer_leave();
        assert!(ed.pointer_move(180.0, 100.0).is_empty());
        assert_eq!(ed.points(), &[FanPoint::new(60.0, 50.0)]);
    }

    #[test]
    fn test_fixed_mode_tap_and_drag() {
        let mut ed = editor(FanProfile::fixed(50.0));

        tap(&mut ed, 20.0, 140.0);
        assert_eq!(ed.profile().fixed_speed, 30.0);

        // Grab the line at 30% and drag it to 80%.
        let t0 = Instant::now();
        ed.pointer_down(150.0, 142.0, t0);
        let intents = ed.pointer_move(150.0, 40.0);
        assert_eq!(intents, vec![EditIntent::SetFixedSpeed(80.0)]);
        ed.pointer_up(150.0, 40.0, t0 + Duration::from_millis(500));
        assert_eq!(ed.profile().fixed_speed, 80.0);
        assert!(ed.points().is_empty());
    }

    #[test]
    fn test_no_control_ignores_gestures() {
        let mut ed = editor(FanProfile::default());
        assert!(tap(&mut ed, 100.0, 100.0).is_empty());
        assert!(long_press(&mut ed, 100.0, 100.0).is_empty());
    }

    #[test]
    fn test_snap_to_grid() {
        let mut profile = FanProfile::curve(Vec::new());
        profile.snap_to_grid = true;
        let mut ed = editor(profile);
        tap(&mut ed, 85.0, 93.0);
        assert_eq!(ed.points(), &[FanPoint::new(45.0, 55.0)]);

        ed.set_mode(ModeKind::Fixed);
        ed.set_fixed_speed(42.0);
        assert_eq!(ed.profile().fixed_speed, 40.0);
    }

    #[test]
    fn test_numeric_edit_of_selected_point() {
        let mut ed = editor(FanProfile::curve(vec![
            FanPoint::new(30.0, 20.0),
            FanPoint::new(60.0, 70.0),
        ]));
        assert!(!ed.set_selected_speed(10.0));

        ed.apply(EditIntent::SelectPoint(Some(0)));
        assert!(ed.set_selected_temperature(75.0));
        assert_eq!(ed.selected(), Some(1));
        assert!(ed.set_selected_speed(140.0));
        assert_eq!(ed.selected_point(), Some(FanPoint::new(75.0, 100.0)));

        ed.clear_selection();
        assert_eq!(ed.selected(), None);
    }

    #[test]
    fn test_out_of_range_intents_are_ignored() {
        let mut ed = editor(FanProfile::curve(vec![FanPoint::new(30.0, 20.0)]));
        ed.apply(EditIntent::DeletePoint(4));
        ed.apply(EditIntent::MovePoint(4, FanPoint::new(1.0, 1.0)));
        ed.apply(EditIntent::SelectPoint(Some(4)));
        assert_eq!(ed.points(), &[FanPoint::new(30.0, 20.0)]);
        assert_eq!(ed.selected(), None);
    }

    #[test]
    fn test_marks_include_live_points() {
        let mut ed = editor(FanProfile::curve(vec![FanPoint::new(50.0, 50.0)]));
        ed.apply(EditIntent::SelectPoint(Some(0)));
        let marks = ed.marks(Some(FanPoint::new(45.0, 40.0)), None);

        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].kind, MarkKind::Curve { index: 0, selected: true });
        assert_eq!((marks[0].x, marks[0].y), (100.0, 100.0));
        assert_eq!(marks[0].label, "50°C 50%");
        assert_eq!(marks[1].kind, MarkKind::Now);
    }

    #[test]
    fn test_finish_returns_sorted_profile() {
        let mut ed = editor(FanProfile::curve(Vec::new()));
        tap(&mut ed, 160.0, 20.0);
        tap(&mut ed, 40.0, 180.0);
        let (name, profile) = ed.finish();
        assert_eq!(name, "test");
        assert!(curve::validate(&profile.points).is_ok());
        assert_eq!(profile.points.len(), 2);
    }
}
