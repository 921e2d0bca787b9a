use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::store::{self, BLOG_ADMIN_KEY, BLOG_POSTS_KEY, KvStore};

pub mod editor;

pub use editor::{Editor, EditorMode, PostDraft};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl BlogPost {
    /// Last modification time, falling back to creation.
    pub fn touched_at(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("no post with id: {0}")]
    NotFound(String),

    #[error("post {0} is published from the site files and cannot be deleted here")]
    ReadOnly(String),

    #[error("admin mode required (pass --admin)")]
    AdminRequired,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Whether admin mode is on. Asking for it explicitly latches the session flag.
pub fn admin_session(store: &dyn KvStore, requested: bool) -> anyhow::Result<bool> {
    if requested {
        store.set(BLOG_ADMIN_KEY, "1")?;
        return Ok(true);
    }
    Ok(store.get(BLOG_ADMIN_KEY)?.as_deref().map(str::trim) == Some("1"))
}

pub fn logout(store: &dyn KvStore) -> anyhow::Result<()> {
    store.remove(BLOG_ADMIN_KEY)
}

/// Published posts from the site files plus locally authored ones.
pub struct BlogStore<'s> {
    store: &'s dyn KvStore,
    public: Vec<BlogPost>,
    local: Vec<BlogPost>,
    admin: bool,
}

impl<'s> BlogStore<'s> {
    pub fn open(store: &'s dyn KvStore, public: Vec<BlogPost>, admin: bool) -> anyhow::Result<Self> {
        let local: Vec<BlogPost> = store::load_json(store, BLOG_POSTS_KEY)?;
        debug!(public = public.len(), local = local.len(), admin, "opened blog store");
        Ok(BlogStore {
            store,
            public,
            local,
            admin,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// Public and local posts, one per id (local wins), most recently touched first.
    pub fn combined(&self) -> Vec<&BlogPost> {
        let mut by_id: HashMap<&str, &BlogPost> = HashMap::new();
        for post in &self.public {
            by_id.insert(&post.id, post);
        }
        for post in &self.local {
            by_id.insert(&post.id, post);
        }
        let mut posts: Vec<&BlogPost> = by_id.into_values().collect();
        posts.sort_by(|a, b| b.touched_at().cmp(&a.touched_at()).then_with(|| a.id.cmp(&b.id)));
        posts
    }

    /// What the current viewer may see: everything for admins, published posts otherwise.
    pub fn visible(&self) -> Vec<&BlogPost> {
        let mut posts = self.combined();
        if !self.admin {
            posts.retain(|p| p.status == PostStatus::Published);
        }
        posts
    }

    pub fn get(&self, id: &str) -> Option<&BlogPost> {
        self.local
            .iter()
            .find(|p| p.id == id)
            .or_else(|| self.public.iter().find(|p| p.id == id))
    }

    /// Save the editor's draft, creating or updating according to its mode.
    pub fn submit(&mut self, editor: &Editor, now: DateTime<Utc>) -> Result<BlogPost, BlogError> {
        self.require_admin()?;
        editor.validate()?;
        let draft = editor.draft.normalized();

        let post = match &editor.mode {
            EditorMode::Create => {
                let post = BlogPost {
                    id: uuid::Uuid::new_v4().to_string(),
                    title: draft.title,
                    author: draft.author,
                    status: draft.status,
                    content: draft.content,
                    created_at: now,
                    updated_at: Some(now),
                    published_at: (draft.status == PostStatus::Published).then_some(now),
                };
                self.local.push(post.clone());
                info!(id = %post.id, status = %post.status, "created post");
                post
            }
            EditorMode::Edit { target_id } => {
                let idx = match self.local.iter().position(|p| &p.id == target_id) {
                    Some(i) => i,
                    None => {
                        // Editing a published site post starts a local copy that overrides it.
                        let public = self
                            .public
                            .iter()
                            .find(|p| &p.id == target_id)
                            .cloned()
                            .ok_or_else(|| BlogError::NotFound(target_id.clone()))?;
                        self.local.push(public);
                        self.local.len() - 1
                    }
                };
                let post = &mut self.local[idx];
                post.title = draft.title;
                post.author = draft.author;
                post.content = draft.content;
                post.status = draft.status;
                post.updated_at = Some(now);
                if post.status == PostStatus::Published && post.published_at.is_none() {
                    post.published_at = Some(now);
                }
                info!(id = %post.id, status = %post.status, "updated post");
                post.clone()
            }
        };

        self.persist()?;
        Ok(post)
    }

    /// Remove a local post. Posts that only exist in the site files cannot be deleted.
    pub fn delete(&mut self, id: &str) -> Result<BlogPost, BlogError> {
        self.require_admin()?;
        let Some(idx) = self.local.iter().position(|p| p.id == id) else {
            return Err(if self.public.iter().any(|p| p.id == id) {
                BlogError::ReadOnly(id.to_string())
            } else {
                BlogError::NotFound(id.to_string())
            });
        };
        let removed = self.local.remove(idx);
        self.persist()?;
        info!(id, "deleted post");
        Ok(removed)
    }

    fn require_admin(&self) -> Result<(), BlogError> {
        if self.admin {
            Ok(())
        } else {
            Err(BlogError::AdminRequired)
        }
    }

    fn persist(&self) -> anyhow::Result<()> {
        store::save_json(self.store, BLOG_POSTS_KEY, &self.local)
    }
}
