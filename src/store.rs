use crate::{
    CursorDirection, NewCode, NewPost, OwnerId, PageCursor, Post, PostId, PostSummary, StoreError, Tag, TagId,
};

/// Arguments of one paged retrieval.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageRequest {
    pub cursor: Option<PageCursor>,
    pub direction: CursorDirection,
    pub limit: u32,
}

/// Data-layer port. Implementations own the query logic; callers rely only on the
/// contracts documented here.
///
/// Methods that target a post by id do not check ownership themselves: callers
/// check it with [`PostStore::owns_post`] first.
pub trait PostStore {
    /// At most `request.limit` of `owner`'s posts.
    ///
    /// * no cursor: newest first, whatever the direction.
    /// * `Forward` with a cursor: keys strictly below the cursor, newest first.
    /// * `Backward` with a cursor: keys at or above the cursor, oldest first.
    fn page_posts(&self, owner: &OwnerId, request: &PageRequest) -> Result<Vec<PostSummary>, StoreError>;

    /// Every post of `owner`, newest first.
    fn posts_by_owner(&self, owner: &OwnerId) -> Result<Vec<PostSummary>, StoreError>;

    /// Creates the post with its tags, links and codes, assigning `id` and `created_at`.
    fn create_post(&self, owner: &OwnerId, post: &NewPost) -> Result<PostId, StoreError>;

    /// `None` when the post is missing or belongs to someone else.
    fn post_for_owner(&self, owner: &OwnerId, post_id: PostId) -> Result<Option<Post>, StoreError>;

    fn owns_post(&self, owner: &OwnerId, post_id: PostId) -> Result<bool, StoreError>;

    /// Removes the post together with its links, codes and tag links.
    fn delete_post(&self, post_id: PostId) -> Result<(), StoreError>;

    fn update_title(&self, post_id: PostId, title: &str) -> Result<(), StoreError>;

    fn update_description(&self, post_id: PostId, description: &str) -> Result<(), StoreError>;

    fn add_link(&self, post_id: PostId, link: &str) -> Result<i64, StoreError>;

    /// `false` when no link `link_id` is attached to the post.
    fn update_link(&self, post_id: PostId, link_id: i64, link: &str) -> Result<bool, StoreError>;

    fn delete_link(&self, post_id: PostId, link_id: i64) -> Result<bool, StoreError>;

    fn add_code(&self, post_id: PostId, code: &NewCode) -> Result<i64, StoreError>;

    fn update_code(&self, post_id: PostId, code_id: i64, code: &NewCode) -> Result<bool, StoreError>;

    fn delete_code(&self, post_id: PostId, code_id: i64) -> Result<bool, StoreError>;

    /// All tags created by `owner`, by id.
    fn tags(&self, owner: &OwnerId) -> Result<Vec<Tag>, StoreError>;

    fn tag(&self, owner: &OwnerId, tag_id: TagId) -> Result<Option<Tag>, StoreError>;

    /// The owner's tag with this description, created when it does not exist yet.
    fn find_or_create_tag(&self, owner: &OwnerId, description: &str) -> Result<Tag, StoreError>;

    /// `false` when the tag was already linked to the post.
    fn link_tag(&self, post_id: PostId, tag_id: TagId) -> Result<bool, StoreError>;

    fn unlink_tag(&self, post_id: PostId, tag_id: TagId) -> Result<bool, StoreError>;
}
