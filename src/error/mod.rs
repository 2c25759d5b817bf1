use crate::api::ApiError;
use crate::editor::EditorError;
use crate::tasks::TaskError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Task(#[from] TaskError),
}
