use crate::blog::{BlogError, BlogPost, PostStatus};

/// What a save does: make a new post or rewrite an existing one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit { target_id: String },
}

/// The editable fields of a post.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub author: String,
    pub content: String,
    pub status: PostStatus,
}

impl PostDraft {
    /// Prefill from an existing post, as the edit button does.
    pub fn from_post(post: &BlogPost) -> Self {
        PostDraft {
            title: post.title.clone(),
            author: post.author.clone(),
            content: post.content.clone(),
            status: post.status,
        }
    }

    pub(crate) fn normalized(&self) -> PostDraft {
        PostDraft {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            // Leading indentation can be meaningful in the body.
            content: self.content.trim_end().to_string(),
            status: self.status,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Editor {
    pub mode: EditorMode,
    pub draft: PostDraft,
}

impl Editor {
    pub fn create(draft: PostDraft) -> Self {
        Editor {
            mode: EditorMode::Create,
            draft,
        }
    }

    pub fn edit(target_id: impl Into<String>, draft: PostDraft) -> Self {
        Editor {
            mode: EditorMode::Edit {
                target_id: target_id.into(),
            },
            draft,
        }
    }

    /// Required fields must be non-blank; nothing is saved otherwise.
    pub fn validate(&self) -> Result<(), BlogError> {
        if self.draft.title.trim().is_empty() {
            return Err(BlogError::MissingField("title"));
        }
        if self.draft.content.trim().is_empty() {
            return Err(BlogError::MissingField("content"));
        }
        Ok(())
    }
}
