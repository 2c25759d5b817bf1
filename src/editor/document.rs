use std::cmp::Ordering;

use image::DynamicImage;

use crate::api::UploadedImage;
use crate::geometry::{sanitize_rect, NormRect};
use crate::ocr::OcrState;

use super::{EditorError, EditorResult};

pub type QuestionId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub label: String,
    pub question_bbox: NormRect,
    pub figure_bboxes: Vec<NormRect>,
    pub ocr: OcrState,
}

impl Question {
    fn new(id: QuestionId, label: String, question_bbox: NormRect) -> Self {
        Self {
            id,
            label,
            question_bbox,
            figure_bboxes: Vec::new(),
            ocr: OcrState::default(),
        }
    }

    pub fn has_figure(&self) -> bool {
        !self.figure_bboxes.is_empty()
    }
}

/// One uploaded image and the questions annotated on it.
#[derive(Debug, Clone)]
pub struct Slide {
    pub image_id: String,
    pub name: String,
    pub url: String,
    reported_size: Option<(u32, u32)>,
    image: Option<DynamicImage>,
    pub questions: Vec<Question>,
}

impl Slide {
    pub fn new(image_id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            name: name.into(),
            url: url.into(),
            reported_size: None,
            image: None,
            questions: Vec::new(),
        }
    }

    pub fn from_upload(image: &UploadedImage) -> Self {
        let mut slide = Self::new(&image.image_id, &image.image_name, &image.image_url);
        if image.image_width > 0 && image.image_height > 0 {
            slide.reported_size = Some((image.image_width, image.image_height));
        }
        slide
    }

    /// Decodes the slide's image; the decoded dimensions replace the ones the
    /// server reported.
    pub fn load_image(&mut self, bytes: &[u8]) -> EditorResult<()> {
        let decoded = image::load_from_memory(bytes).map_err(|err| EditorError::ImageDecode {
            name: self.name.clone(),
            message: err.to_string(),
        })?;
        tracing::debug!(
            image_id = %self.image_id,
            width = decoded.width(),
            height = decoded.height(),
            "slide image loaded"
        );
        self.image = Some(decoded);
        Ok(())
    }

    pub fn rect_of(&self, target: Selection) -> Option<NormRect> {
        let question = self.questions.get(target.question_index())?;
        match target {
            Selection::Question { .. } => Some(question.question_bbox),
            Selection::Figure { fi, .. } => question.figure_bboxes.get(fi).copied(),
        }
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image
            .as_ref()
            .map(|image| (image.width(), image.height()))
            .or(self.reported_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Question { qi: usize },
    Figure { qi: usize, fi: usize },
}

impl Selection {
    pub const fn question_index(self) -> usize {
        match self {
            Self::Question { qi } | Self::Figure { qi, .. } => qi,
        }
    }

    pub const fn is_question(self) -> bool {
        matches!(self, Self::Question { .. })
    }
}

/// Slides, questions and the current selection. Selection is index-based and
/// always refers to the current slide.
#[derive(Debug, Default)]
pub struct Document {
    slides: Vec<Slide>,
    current: usize,
    selection: Option<Selection>,
    next_question_id: QuestionId,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.slides.clear();
        self.current = 0;
        self.selection = None;
    }

    pub fn replace_slides(&mut self, slides: Vec<Slide>) {
        self.slides = slides;
        self.current = 0;
        self.selection = None;
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub(crate) fn slides_mut(&mut self) -> &mut [Slide] {
        &mut self.slides
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.slides.get(self.current)
    }

    pub fn current_slide_mut(&mut self) -> Option<&mut Slide> {
        self.slides.get_mut(self.current)
    }

    pub fn switch_slide(&mut self, index: usize) -> EditorResult<()> {
        if index >= self.slides.len() {
            return Err(EditorError::SlideOutOfRange {
                index,
                len: self.slides.len(),
            });
        }
        self.current = index;
        self.selection = None;
        Ok(())
    }

    pub fn questions(&self) -> &[Question] {
        self.current_slide()
            .map(|slide| slide.questions.as_slice())
            .unwrap_or(&[])
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn select(&mut self, selection: Option<Selection>) -> EditorResult<()> {
        if let Some(target) = selection {
            self.rect_of(target)?;
        }
        self.selection = selection;
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn rect_of(&self, target: Selection) -> EditorResult<NormRect> {
        let question = self.question(target.question_index())?;
        match target {
            Selection::Question { .. } => Ok(question.question_bbox),
            Selection::Figure { qi, fi } => question
                .figure_bboxes
                .get(fi)
                .copied()
                .ok_or(EditorError::FigureOutOfRange { qi, fi }),
        }
    }

    pub fn set_rect(&mut self, target: Selection, rect: NormRect) -> EditorResult<()> {
        let rect = sanitize_rect(&rect.to_array());
        let question = self.question_mut(target.question_index())?;
        match target {
            Selection::Question { .. } => question.question_bbox = rect,
            Selection::Figure { qi, fi } => {
                let slot = question
                    .figure_bboxes
                    .get_mut(fi)
                    .ok_or(EditorError::FigureOutOfRange { qi, fi })?;
                *slot = rect;
            }
        }
        Ok(())
    }

    pub fn question(&self, qi: usize) -> EditorResult<&Question> {
        let questions = self.questions();
        questions.get(qi).ok_or(EditorError::QuestionOutOfRange {
            qi,
            len: questions.len(),
        })
    }

    pub fn question_mut(&mut self, qi: usize) -> EditorResult<&mut Question> {
        let slide = self.current_slide_mut().ok_or(EditorError::NoSlide)?;
        let len = slide.questions.len();
        slide
            .questions
            .get_mut(qi)
            .ok_or(EditorError::QuestionOutOfRange { qi, len })
    }

    /// Appends a question to the current slide and returns its index.
    pub fn add_question(&mut self, rect: NormRect) -> EditorResult<usize> {
        self.next_question_id = self.next_question_id.wrapping_add(1);
        let id = self.next_question_id;
        let slide = self.current_slide_mut().ok_or(EditorError::NoSlide)?;
        let label = (slide.questions.len() + 1).to_string();
        slide
            .questions
            .push(Question::new(id, label, sanitize_rect(&rect.to_array())));
        Ok(slide.questions.len() - 1)
    }

    /// Appends a figure to question `qi` and returns its index.
    pub fn add_figure(&mut self, qi: usize, rect: NormRect) -> EditorResult<usize> {
        let question = self.question_mut(qi)?;
        question.figure_bboxes.push(sanitize_rect(&rect.to_array()));
        Ok(question.figure_bboxes.len() - 1)
    }

    pub fn delete_question(&mut self, k: usize) -> EditorResult<Question> {
        let slide = self.current_slide_mut().ok_or(EditorError::NoSlide)?;
        if k >= slide.questions.len() {
            return Err(EditorError::QuestionOutOfRange {
                qi: k,
                len: slide.questions.len(),
            });
        }
        let removed = slide.questions.remove(k);
        for (index, question) in slide.questions.iter_mut().enumerate() {
            question.label = (index + 1).to_string();
        }
        let remaining = slide.questions.len();
        self.selection = selection_after_question_delete(self.selection, k, remaining);
        Ok(removed)
    }

    pub fn delete_figure(&mut self, k: usize, f: usize) -> EditorResult<NormRect> {
        let question = self.question_mut(k)?;
        if f >= question.figure_bboxes.len() {
            return Err(EditorError::FigureOutOfRange { qi: k, fi: f });
        }
        let removed = question.figure_bboxes.remove(f);
        self.selection = selection_after_figure_delete(self.selection, k, f);
        Ok(removed)
    }

    pub fn delete(&mut self, target: Selection) -> EditorResult<()> {
        match target {
            Selection::Question { qi } => self.delete_question(qi).map(|_| ()),
            Selection::Figure { qi, fi } => self.delete_figure(qi, fi).map(|_| ()),
        }
    }

    /// Locates a question by identity across all slides.
    pub fn find_question_mut(&mut self, image_id: &str, id: QuestionId) -> Option<&mut Question> {
        self.slides
            .iter_mut()
            .find(|slide| slide.image_id == image_id)?
            .questions
            .iter_mut()
            .find(|question| question.id == id)
    }
}

pub fn selection_after_question_delete(
    selection: Option<Selection>,
    k: usize,
    remaining: usize,
) -> Option<Selection> {
    let selection = selection?;
    let qi = selection.question_index();
    if qi < k {
        return Some(selection);
    }
    if qi > k {
        return Some(match selection {
            Selection::Question { qi } => Selection::Question { qi: qi - 1 },
            Selection::Figure { qi, fi } => Selection::Figure { qi: qi - 1, fi },
        });
    }
    if remaining == 0 {
        None
    } else {
        Some(Selection::Question {
            qi: k.min(remaining - 1),
        })
    }
}

/// Where `target` sits once `deleted` has been removed, or `None` when it was
/// removed along with it.
pub fn target_after_delete(target: Selection, deleted: Selection) -> Option<Selection> {
    match deleted {
        Selection::Question { qi: k } => match target.question_index().cmp(&k) {
            Ordering::Less => Some(target),
            Ordering::Equal => None,
            Ordering::Greater => Some(match target {
                Selection::Question { qi } => Selection::Question { qi: qi - 1 },
                Selection::Figure { qi, fi } => Selection::Figure { qi: qi - 1, fi },
            }),
        },
        Selection::Figure { qi: k, fi: f } => match target {
            Selection::Figure { qi, fi } if qi == k && fi == f => None,
            Selection::Figure { qi, fi } if qi == k && fi > f => {
                Some(Selection::Figure { qi, fi: fi - 1 })
            }
            other => Some(other),
        },
    }
}

pub fn selection_after_figure_delete(
    selection: Option<Selection>,
    k: usize,
    f: usize,
) -> Option<Selection> {
    match selection? {
        Selection::Figure { qi, fi } if qi == k && fi == f => Some(Selection::Question { qi }),
        Selection::Figure { qi, fi } if qi == k && fi > f => {
            Some(Selection::Figure { qi, fi: fi - 1 })
        }
        other => Some(other),
    }
}
