//! List and canvas views derived from the same document.

use crate::geometry::{to_pixel_space, CanvasSize, NormRect, PixelRect, ResizeHandle};

use super::document::Selection;
use super::hit_test::{delete_icon_rect, Hover, HANDLE_DRAW_SIZE};
use super::{Editor, ToolKind};

#[derive(Debug, Clone, PartialEq)]
pub struct FigureRow {
    pub fi: usize,
    pub rect: NormRect,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    pub qi: usize,
    pub label: String,
    pub rect: NormRect,
    pub selected: bool,
    pub figures: Vec<FigureRow>,
    pub ocr_text: String,
    pub ocr_status: String,
    pub ocr_preview: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasBoxKind {
    Question,
    Figure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasBox {
    pub target: Selection,
    pub kind: CanvasBoxKind,
    pub label: String,
    pub bounds: PixelRect,
    pub selected: bool,
    pub hovered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasView {
    pub size: CanvasSize,
    /// Paint order: each question followed by its figures.
    pub boxes: Vec<CanvasBox>,
    pub preview: Option<PixelRect>,
    pub handles: Vec<(ResizeHandle, PixelRect)>,
    pub delete_icon: Option<PixelRect>,
    pub cursor: &'static str,
}

/// Receives both views together so they never drift apart.
pub trait RenderSink {
    fn render_list(&mut self, rows: &[ListRow]);
    fn render_canvas(&mut self, view: &CanvasView);
}

fn hovered_target(hover: Hover) -> Option<Selection> {
    match hover {
        Hover::None => None,
        Hover::Delete(target)
        | Hover::Move(target)
        | Hover::Select(target)
        | Hover::Resize { target, .. } => Some(target),
    }
}

impl Editor {
    pub fn list_view(&self) -> Vec<ListRow> {
        let selection = self.document.selection();
        self.document
            .questions()
            .iter()
            .enumerate()
            .map(|(qi, question)| ListRow {
                qi,
                label: question.label.clone(),
                rect: question.question_bbox,
                selected: selection == Some(Selection::Question { qi }),
                figures: question
                    .figure_bboxes
                    .iter()
                    .enumerate()
                    .map(|(fi, rect)| FigureRow {
                        fi,
                        rect: *rect,
                        selected: selection == Some(Selection::Figure { qi, fi }),
                    })
                    .collect(),
                ocr_text: question.ocr.text.clone(),
                ocr_status: question.ocr.status_line(),
                ocr_preview: question.ocr.preview.clone(),
            })
            .collect()
    }

    pub fn canvas_view(&self) -> CanvasView {
        let canvas = self.canvas;
        let selection = self.document.selection();
        let hovered = hovered_target(self.hover);
        let mut boxes = Vec::new();
        for (qi, question) in self.document.questions().iter().enumerate() {
            let target = Selection::Question { qi };
            boxes.push(CanvasBox {
                target,
                kind: CanvasBoxKind::Question,
                label: question.label.clone(),
                bounds: to_pixel_space(question.question_bbox, canvas),
                selected: selection == Some(target),
                hovered: hovered == Some(target),
            });
            for (fi, figure) in question.figure_bboxes.iter().enumerate() {
                let target = Selection::Figure { qi, fi };
                boxes.push(CanvasBox {
                    target,
                    kind: CanvasBoxKind::Figure,
                    label: format!("{}-图{}", question.label, fi + 1),
                    bounds: to_pixel_space(*figure, canvas),
                    selected: selection == Some(target),
                    hovered: hovered == Some(target),
                });
            }
        }

        let selected_bounds = match (self.tool, selection) {
            (ToolKind::Select, Some(target)) => self
                .document
                .rect_of(target)
                .ok()
                .map(|rect| to_pixel_space(rect, canvas)),
            _ => None,
        };
        let handles: Vec<(ResizeHandle, PixelRect)> = selected_bounds
            .map(|bounds| {
                ResizeHandle::ALL
                    .into_iter()
                    .map(|handle| {
                        (
                            handle,
                            PixelRect::centered(handle.anchor(&bounds), HANDLE_DRAW_SIZE),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        CanvasView {
            size: canvas,
            boxes,
            preview: self
                .interaction
                .preview_rect()
                .map(|rect| to_pixel_space(rect, canvas)),
            handles,
            delete_icon: selected_bounds.map(|bounds| delete_icon_rect(&bounds, canvas)),
            cursor: self.cursor(),
        }
    }

    /// Renders both views if anything changed since the last flush.
    pub fn flush_render(&mut self, sink: &mut dyn RenderSink) -> bool {
        if !self.needs_render {
            return false;
        }
        sink.render_list(&self.list_view());
        sink.render_canvas(&self.canvas_view());
        self.needs_render = false;
        true
    }
}
