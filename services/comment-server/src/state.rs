use std::sync::Arc;

use comment_store::CommentRepository;

#[derive(Clone)]
pub struct AppState {
    pub comments: Arc<dyn CommentRepository>,
}

impl AppState {
    pub fn new(comments: Arc<dyn CommentRepository>) -> Self {
        Self { comments }
    }
}
