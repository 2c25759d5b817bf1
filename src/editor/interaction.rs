//! Pointer gesture state machine: idle, draw, move and resize.

use crate::geometry::{
    move_rect, normalized_delta, rect_from_drag_points, resize_rect, CanvasPoint, NormRect,
    ResizeHandle,
};

use super::document::{target_after_delete, Selection};
use super::hit_test::{resolve_hover, Hover};
use super::{Editor, EditorError, StatusLevel, ToolKind};

const DRAW_TOO_SMALL: &str = "框选区域太小，已忽略。";
const FIGURE_NEEDS_QUESTION: &str = "请先选择一道题目，再框选配图。";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    Idle,
    Draw,
    Move,
    Resize,
}

/// Transient gesture state. Move and resize keep the rect as it was at drag
/// start and replay the full delta on every pointer move.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    Draw {
        tool: ToolKind,
        start: CanvasPoint,
        preview: NormRect,
    },
    Move {
        target: Selection,
        start: CanvasPoint,
        origin: NormRect,
    },
    Resize {
        target: Selection,
        handle: ResizeHandle,
        start: CanvasPoint,
        origin: NormRect,
    },
}

impl Interaction {
    pub const fn mode(&self) -> InteractionMode {
        match self {
            Self::Idle => InteractionMode::Idle,
            Self::Draw { .. } => InteractionMode::Draw,
            Self::Move { .. } => InteractionMode::Move,
            Self::Resize { .. } => InteractionMode::Resize,
        }
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub const fn preview_rect(&self) -> Option<NormRect> {
        match self {
            Self::Draw { preview, .. } => Some(*preview),
            _ => None,
        }
    }

    /// Re-points a move or resize at its box after `deleted` is removed. The
    /// gesture ends when its own box is gone.
    fn after_delete(self, deleted: Selection) -> Self {
        match self {
            Self::Move {
                target,
                start,
                origin,
            } => match target_after_delete(target, deleted) {
                Some(target) => Self::Move {
                    target,
                    start,
                    origin,
                },
                None => Self::Idle,
            },
            Self::Resize {
                target,
                handle,
                start,
                origin,
            } => match target_after_delete(target, deleted) {
                Some(target) => Self::Resize {
                    target,
                    handle,
                    start,
                    origin,
                },
                None => Self::Idle,
            },
            Self::Idle | Self::Draw { .. } => self,
        }
    }
}

impl Editor {
    fn hover_at(&self, point: CanvasPoint) -> Hover {
        resolve_hover(
            self.document.current_slide(),
            self.document.selection(),
            self.tool,
            point,
            self.canvas,
        )
    }

    fn begin_gesture(&mut self, next: Interaction) {
        tracing::debug!(from = ?self.interaction.mode(), to = ?next.mode(), "gesture started");
        self.interaction = next;
        self.hover = Hover::None;
        self.mark_changed();
    }

    pub(super) fn retarget_gesture(&mut self, deleted: Selection) {
        let next = self.interaction.after_delete(deleted);
        if next.is_idle() && !self.interaction.is_idle() {
            tracing::debug!(?deleted, "gesture target deleted, gesture cancelled");
        }
        self.interaction = next;
    }

    fn begin_edit(&mut self, target: Selection, start: CanvasPoint, handle: Option<ResizeHandle>) {
        let origin = match self.document.rect_of(target) {
            Ok(origin) => origin,
            Err(err) => {
                tracing::warn!(?target, %err, "cannot start edit gesture");
                return;
            }
        };
        let next = match handle {
            Some(handle) => Interaction::Resize {
                target,
                handle,
                start,
                origin,
            },
            None => Interaction::Move {
                target,
                start,
                origin,
            },
        };
        self.begin_gesture(next);
    }

    pub fn pointer_down(&mut self, point: CanvasPoint) {
        if !self.interaction.is_idle() {
            tracing::debug!(mode = ?self.interaction.mode(), "pointer down ignored during gesture");
            return;
        }
        if self.document.current_slide().is_none() {
            return;
        }
        let point = self.canvas.clamp_point(point);

        if self.tool.is_draw() {
            let preview = rect_from_drag_points(point, point, self.canvas);
            self.begin_gesture(Interaction::Draw {
                tool: self.tool,
                start: point,
                preview,
            });
            return;
        }

        match self.hover_at(point) {
            Hover::None => {
                if self.document.selection().is_some() {
                    self.document.clear_selection();
                    self.mark_changed();
                }
                self.hover = Hover::None;
            }
            Hover::Delete(target) => {
                if let Err(err) = self.delete(target) {
                    tracing::warn!(?target, %err, "delete from canvas failed");
                }
                self.hover = self.hover_at(point);
            }
            Hover::Resize { target, handle } => self.begin_edit(target, point, Some(handle)),
            Hover::Move(target) => self.begin_edit(target, point, None),
            Hover::Select(target) => {
                if let Err(err) = self.document.select(Some(target)) {
                    tracing::warn!(?target, %err, "select from canvas failed");
                    return;
                }
                self.begin_edit(target, point, None);
            }
        }
    }

    pub fn pointer_move(&mut self, point: CanvasPoint) {
        let point = self.canvas.clamp_point(point);
        match self.interaction {
            Interaction::Idle => {
                let hover = self.hover_at(point);
                if hover != self.hover {
                    self.hover = hover;
                    self.mark_changed();
                }
            }
            Interaction::Draw { tool, start, .. } => {
                let preview = rect_from_drag_points(start, point, self.canvas);
                self.interaction = Interaction::Draw {
                    tool,
                    start,
                    preview,
                };
                self.mark_changed();
            }
            Interaction::Move { .. } | Interaction::Resize { .. } => {
                self.replay_edit(point);
            }
        }
    }

    pub fn pointer_up(&mut self, point: CanvasPoint) {
        let point = self.canvas.clamp_point(point);
        match self.interaction {
            Interaction::Idle => return,
            Interaction::Draw { tool, start, .. } => {
                let rect = rect_from_drag_points(start, point, self.canvas);
                self.interaction = Interaction::Idle;
                self.finish_draw(tool, rect);
            }
            Interaction::Move { target, origin, .. } | Interaction::Resize { target, origin, .. } => {
                let committed = self.replay_edit(point);
                self.interaction = Interaction::Idle;
                if let Some(rect) = committed {
                    self.finish_edit(target, origin, rect);
                }
            }
        }
        tracing::debug!("gesture finished");
        self.hover = self.hover_at(point);
        self.mark_changed();
    }

    /// Applies the whole drag delta to the snapshot taken at drag start.
    fn replay_edit(&mut self, point: CanvasPoint) -> Option<NormRect> {
        let (target, rect) = match self.interaction {
            Interaction::Move {
                target,
                start,
                origin,
            } => {
                let (dx, dy) = normalized_delta(start, point, self.canvas);
                (target, move_rect(origin, dx, dy))
            }
            Interaction::Resize {
                target,
                handle,
                start,
                origin,
            } => {
                let (dx, dy) = normalized_delta(start, point, self.canvas);
                (target, resize_rect(origin, handle, dx, dy))
            }
            Interaction::Idle | Interaction::Draw { .. } => return None,
        };
        match self.document.set_rect(target, rect) {
            Ok(()) => {
                self.mark_changed();
                Some(rect)
            }
            Err(err) => {
                tracing::warn!(?target, %err, "edit target vanished, gesture cancelled");
                self.interaction = Interaction::Idle;
                None
            }
        }
    }

    fn finish_edit(&mut self, target: Selection, origin: NormRect, rect: NormRect) {
        if rect == origin {
            return;
        }
        if let Selection::Question { qi } = target {
            self.request_ocr_quietly(qi);
        }
    }

    fn finish_draw(&mut self, tool: ToolKind, rect: NormRect) {
        if rect.is_below_min_size() {
            self.set_status(StatusLevel::Warning, DRAW_TOO_SMALL);
            return;
        }
        match tool {
            ToolKind::DrawQuestion => match self.document.add_question(rect) {
                Ok(qi) => {
                    if let Err(err) = self.document.select(Some(Selection::Question { qi })) {
                        tracing::warn!(qi, %err, "new question not selected");
                    }
                    self.set_status(StatusLevel::Info, format!("已添加第 {} 题。", qi + 1));
                    self.request_ocr_quietly(qi);
                }
                Err(err) => tracing::warn!(%err, "question not added"),
            },
            ToolKind::DrawFigure => {
                let Some(qi) = self.document.selection().map(Selection::question_index) else {
                    self.set_status(StatusLevel::Warning, FIGURE_NEEDS_QUESTION);
                    return;
                };
                match self.document.add_figure(qi, rect) {
                    Ok(fi) => {
                        if let Err(err) = self.document.select(Some(Selection::Figure { qi, fi })) {
                            tracing::warn!(qi, fi, %err, "new figure not selected");
                        }
                        self.set_status(
                            StatusLevel::Info,
                            format!("已为第 {} 题添加配图 {}。", qi + 1, fi + 1),
                        );
                    }
                    Err(err) => tracing::warn!(%err, "figure not added"),
                }
            }
            ToolKind::Select => {}
        }
    }

    fn request_ocr_quietly(&mut self, qi: usize) {
        match self.request_ocr(qi) {
            Ok(()) => {}
            Err(EditorError::NoSession) => tracing::debug!(qi, "OCR skipped without session"),
            Err(err) => tracing::warn!(qi, %err, "OCR request not queued"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::test_support::editor;
    use crate::geometry::assert_rect_close;

    fn p(x: f64, y: f64) -> CanvasPoint {
        CanvasPoint::new(x, y)
    }

    fn drag(editor: &mut Editor, from: CanvasPoint, to: CanvasPoint) {
        editor.pointer_down(from);
        editor.pointer_move(to);
        editor.pointer_up(to);
    }

    fn question_rect(editor: &Editor, qi: usize) -> NormRect {
        editor.document().questions()[qi].question_bbox
    }

    #[test]
    fn draw_then_move_question_end_to_end() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        editor.pointer_down(p(10.0, 10.0));
        editor.pointer_move(p(60.0, 30.0));
        assert_eq!(editor.interaction().mode(), InteractionMode::Draw);
        assert_rect_close(
            editor.interaction().preview_rect().expect("preview"),
            [0.05, 0.1, 0.3, 0.3],
        );
        editor.pointer_up(p(110.0, 60.0));

        assert_rect_close(question_rect(&editor, 0), [0.05, 0.1, 0.55, 0.6]);
        assert_eq!(editor.selection(), Some(Selection::Question { qi: 0 }));
        assert_eq!(editor.take_ocr_requests().len(), 1);

        editor.select_tool(ToolKind::Select);
        drag(&mut editor, p(50.0, 30.0), p(70.0, 30.0));
        assert_rect_close(question_rect(&editor, 0), [0.15, 0.1, 0.65, 0.6]);
        assert_eq!(editor.take_ocr_requests().len(), 1);
        assert!(editor.interaction().is_idle());
    }

    #[test]
    fn move_replays_from_snapshot_without_drift() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(20.0, 20.0), p(60.0, 60.0));
        editor.select_tool(ToolKind::Select);

        editor.pointer_down(p(40.0, 40.0));
        for step in 1..=10 {
            editor.pointer_move(p(40.0 + f64::from(step), 40.0));
        }
        editor.pointer_move(p(50.0, 40.0));
        editor.pointer_up(p(50.0, 40.0));
        assert_rect_close(question_rect(&editor, 0), [0.15, 0.2, 0.35, 0.6]);
    }

    #[test]
    fn resize_through_handle_clamps_to_min_size() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(20.0, 20.0), p(100.0, 60.0));
        editor.take_ocr_requests();
        editor.select_tool(ToolKind::Select);

        drag(&mut editor, p(100.0, 60.0), p(140.0, 80.0));
        assert_rect_close(question_rect(&editor, 0), [0.1, 0.2, 0.7, 0.8]);
        assert_eq!(editor.take_ocr_requests().len(), 1);

        drag(&mut editor, p(20.0, 50.0), p(199.0, 50.0));
        assert_rect_close(question_rect(&editor, 0), [0.69, 0.2, 0.7, 0.8]);
    }

    #[test]
    fn click_without_drag_does_not_retrigger_ocr() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(20.0, 20.0), p(100.0, 60.0));
        editor.take_ocr_requests();
        editor.select_tool(ToolKind::Select);

        editor.pointer_down(p(50.0, 40.0));
        editor.pointer_up(p(50.0, 40.0));
        assert!(editor.take_ocr_requests().is_empty());
    }

    #[test]
    fn too_small_draw_is_discarded_with_notice() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(10.0, 10.0), p(11.0, 80.0));
        assert!(editor.document().questions().is_empty());
        assert_eq!(editor.status().message, DRAW_TOO_SMALL);
        assert_eq!(editor.status().level, StatusLevel::Warning);
        assert!(editor.take_ocr_requests().is_empty());
    }

    #[test]
    fn figure_requires_question_selection() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawFigure);
        drag(&mut editor, p(10.0, 10.0), p(50.0, 50.0));
        assert_eq!(editor.status().message, FIGURE_NEEDS_QUESTION);
        assert!(editor.document().questions().is_empty());

        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(10.0, 10.0), p(190.0, 90.0));
        editor.select_tool(ToolKind::DrawFigure);
        drag(&mut editor, p(20.0, 20.0), p(60.0, 60.0));
        assert_eq!(editor.selection(), Some(Selection::Figure { qi: 0, fi: 0 }));

        drag(&mut editor, p(80.0, 20.0), p(120.0, 60.0));
        assert_eq!(editor.selection(), Some(Selection::Figure { qi: 0, fi: 1 }));
        assert_eq!(editor.document().questions()[0].figure_bboxes.len(), 2);
        assert_eq!(editor.take_ocr_requests().len(), 1);
    }

    #[test]
    fn clicking_unselected_box_selects_and_empty_area_clears() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(10.0, 10.0), p(50.0, 50.0));
        drag(&mut editor, p(100.0, 10.0), p(150.0, 50.0));
        editor.select_tool(ToolKind::Select);
        assert_eq!(editor.selection(), Some(Selection::Question { qi: 1 }));

        editor.pointer_down(p(30.0, 30.0));
        assert_eq!(editor.selection(), Some(Selection::Question { qi: 0 }));
        assert_eq!(editor.interaction().mode(), InteractionMode::Move);
        editor.pointer_up(p(30.0, 30.0));

        editor.pointer_down(p(80.0, 90.0));
        editor.pointer_up(p(80.0, 90.0));
        assert_eq!(editor.selection(), None);
    }

    #[test]
    fn delete_icon_removes_selected_box() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(20.0, 40.0), p(100.0, 90.0));
        editor.select_tool(ToolKind::Select);

        // Icon sits just outside the top-right corner (100, 40).
        editor.pointer_down(p(110.0, 25.0));
        assert!(editor.document().questions().is_empty());
        assert_eq!(editor.selection(), None);
        assert!(editor.interaction().is_idle());
    }

    #[test]
    fn hover_clears_during_gesture_and_recomputes_after() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(20.0, 20.0), p(100.0, 60.0));
        editor.select_tool(ToolKind::Select);

        editor.pointer_move(p(60.0, 40.0));
        assert_eq!(editor.hover(), Hover::Move(Selection::Question { qi: 0 }));
        assert_eq!(editor.cursor(), "move");

        editor.pointer_down(p(60.0, 40.0));
        assert_eq!(editor.hover(), Hover::None);
        editor.pointer_move(p(70.0, 40.0));
        assert_eq!(editor.hover(), Hover::None);
        editor.pointer_up(p(70.0, 40.0));
        assert_eq!(editor.hover(), Hover::Move(Selection::Question { qi: 0 }));
    }

    #[test]
    fn stray_pointer_up_is_noop_and_tool_switch_resets_gesture() {
        let mut editor = editor();
        editor.pointer_up(p(10.0, 10.0));
        assert!(editor.interaction().is_idle());
        assert!(editor.document().questions().is_empty());

        editor.select_tool(ToolKind::DrawQuestion);
        editor.pointer_down(p(10.0, 10.0));
        editor.pointer_move(p(80.0, 80.0));
        editor.select_tool(ToolKind::Select);
        assert!(editor.interaction().is_idle());
        editor.pointer_up(p(80.0, 80.0));
        assert!(editor.document().questions().is_empty());
    }

    fn three_questions() -> Editor {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(10.0, 10.0), p(30.0, 30.0));
        drag(&mut editor, p(40.0, 10.0), p(60.0, 30.0));
        drag(&mut editor, p(70.0, 50.0), p(90.0, 70.0));
        editor.take_ocr_requests();
        editor.select_tool(ToolKind::Select);
        editor
    }

    #[test]
    fn list_delete_during_move_keeps_dragging_the_same_box() {
        let mut editor = three_questions();
        let dragged = editor.document().questions()[1].id;

        editor.pointer_down(p(50.0, 20.0));
        assert_eq!(editor.interaction().mode(), InteractionMode::Move);
        editor
            .delete(Selection::Question { qi: 0 })
            .expect("delete first question");
        assert!(matches!(
            editor.interaction(),
            Interaction::Move {
                target: Selection::Question { qi: 0 },
                ..
            }
        ));

        editor.pointer_move(p(60.0, 20.0));
        editor.pointer_up(p(60.0, 20.0));
        assert_eq!(editor.document().questions()[0].id, dragged);
        assert_rect_close(question_rect(&editor, 0), [0.25, 0.1, 0.35, 0.3]);
        assert_rect_close(question_rect(&editor, 1), [0.35, 0.5, 0.45, 0.7]);

        let requests = editor.take_ocr_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].question_id, dragged);
    }

    #[test]
    fn deleting_the_dragged_box_cancels_the_gesture() {
        let mut editor = three_questions();

        editor.pointer_down(p(50.0, 20.0));
        editor
            .delete(Selection::Question { qi: 1 })
            .expect("delete dragged question");
        assert!(editor.interaction().is_idle());

        editor.pointer_move(p(90.0, 40.0));
        editor.pointer_up(p(90.0, 40.0));
        assert_rect_close(question_rect(&editor, 0), [0.05, 0.1, 0.15, 0.3]);
        assert_rect_close(question_rect(&editor, 1), [0.35, 0.5, 0.45, 0.7]);
        assert!(editor.take_ocr_requests().is_empty());
    }

    #[test]
    fn deleting_sibling_figure_during_resize_follows_the_figure() {
        let mut editor = editor();
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(10.0, 10.0), p(190.0, 90.0));
        editor.select_tool(ToolKind::DrawFigure);
        drag(&mut editor, p(20.0, 20.0), p(40.0, 40.0));
        drag(&mut editor, p(100.0, 20.0), p(140.0, 60.0));
        editor.select_tool(ToolKind::Select);
        assert_eq!(editor.selection(), Some(Selection::Figure { qi: 0, fi: 1 }));

        // South-east handle of the selected figure.
        editor.pointer_down(p(140.0, 60.0));
        assert_eq!(editor.interaction().mode(), InteractionMode::Resize);
        editor
            .delete(Selection::Figure { qi: 0, fi: 0 })
            .expect("delete first figure");
        editor.pointer_move(p(160.0, 80.0));
        editor.pointer_up(p(160.0, 80.0));

        let figures = &editor.document().questions()[0].figure_bboxes;
        assert_eq!(figures.len(), 1);
        assert_rect_close(figures[0], [0.5, 0.2, 0.8, 0.8]);
        assert_eq!(editor.selection(), Some(Selection::Figure { qi: 0, fi: 0 }));
    }

    #[test]
    fn slide_switch_resets_gesture_and_selection() {
        let mut editor = Editor::new();
        editor.apply_upload(&crate::editor::test_support::upload(&["a", "b"], true));
        editor.set_canvas_size(crate::geometry::CanvasSize::new(200.0, 100.0));
        editor.select_tool(ToolKind::DrawQuestion);
        drag(&mut editor, p(10.0, 10.0), p(50.0, 50.0));
        editor.pointer_down(p(60.0, 60.0));

        editor.switch_slide(1).expect("switch");
        assert!(editor.interaction().is_idle());
        assert_eq!(editor.selection(), None);
        assert!(editor.document().questions().is_empty());
    }
}
