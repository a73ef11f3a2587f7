use crate::{
    pagination_max_count, CursorDirection, CursorParts, Error, OwnerId, PageCursor, PageRequest, PostStore,
    PostSummary, Result, ValidationError,
};

/// Posts returned by one paged retrieval, always newest first.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Page {
    pub posts: Vec<PostSummary>,
    pub direction: CursorDirection,
}

impl Page {
    /// An empty forward page: nothing exists beyond the cursor.
    pub fn is_exhausted(&self) -> bool {
        self.direction.is_forward() && self.posts.is_empty()
    }

    pub fn next_cursor(&self) -> Option<PageCursor> {
        derive_next_cursor(&self.posts, self.direction)
    }
}

/// Cursor for the request following a page displayed newest first.
///
/// After a forward fetch it is the last (oldest) row shown, so the next forward
/// fetch excludes everything already seen. After a backward fetch it is the first
/// (newest) row shown.
pub fn derive_next_cursor(displayed: &[PostSummary], direction: CursorDirection) -> Option<PageCursor> {
    match direction {
        CursorDirection::Forward => displayed.last(),
        CursorDirection::Backward => displayed.first(),
    }
    .map(PostSummary::key)
}

/// Turns a paging intent into exactly one [`PostStore::page_posts`] call for one owner.
#[derive(Debug)]
pub struct PageQuery<'s, S: ?Sized> {
    store: &'s S,
    owner: OwnerId,
    limit: u32,
}

impl<'s, S: PostStore + ?Sized> PageQuery<'s, S> {
    pub fn new(store: &'s S, owner: OwnerId, limit: u32) -> Result<Self> {
        check_limit(limit, *pagination_max_count())?;
        Ok(Self { store, owner, limit })
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// [`PageQuery::fetch_page`] for cursor components as a client sent them. A cursor
    /// carrying only one component is rejected before the store is called.
    pub fn fetch_page_parts(&self, parts: CursorParts, direction: CursorDirection) -> Result<Page> {
        self.fetch_page(parts.validate()?, direction)
    }

    /// Fetches one page and normalizes it to newest first.
    ///
    /// An empty backward page with a cursor is an [`Error::EmptyBoundary`], since the
    /// boundary row itself should always come back.
    pub fn fetch_page(&self, cursor: Option<PageCursor>, direction: CursorDirection) -> Result<Page> {
        let request = PageRequest {
            cursor,
            direction,
            limit: self.limit,
        };

        tracing::debug!(
            owner = %self.owner,
            ?direction,
            limit = self.limit,
            has_cursor = cursor.is_some(),
            "fetching page"
        );

        let mut posts = self.store.page_posts(&self.owner, &request).map_err(|err| {
            tracing::warn!(owner = %self.owner, ?direction, %err, "page retrieval failed");
            Error::from(err)
        })?;

        if let Some(cursor) = cursor {
            if direction.is_backward() {
                if posts.is_empty() {
                    tracing::warn!(owner = %self.owner, %cursor, "backward page came back empty");
                    return Err(Error::EmptyBoundary { cursor });
                }
                posts.reverse();
            }
        }
        posts.truncate(self.limit as usize);

        tracing::debug!(owner = %self.owner, rows = posts.len(), "page fetched");
        Ok(Page { posts, direction })
    }

    /// Cursor that, fetched backward, yields the page just newer than `page`.
    ///
    /// It is the key of the row immediately newer than the page's newest row, so the
    /// inclusive backward bound never shows a row of `page` again. `None` when the page
    /// is empty or already starts at the owner's newest post.
    pub fn previous_cursor(&self, page: &Page) -> Result<Option<PageCursor>> {
        let Some(newest) = page.posts.first().map(PostSummary::key) else {
            return Ok(None);
        };
        let request = PageRequest {
            cursor: Some(newest),
            direction: CursorDirection::Backward,
            limit: 2,
        };
        let rows = self.store.page_posts(&self.owner, &request)?;
        Ok(rows.iter().map(PostSummary::key).find(|key| *key > newest))
    }
}

pub(crate) fn check_limit(limit: u32, max: Option<u32>) -> Result<(), ValidationError> {
    if limit == 0 {
        return Err(ValidationError::ZeroLimit);
    }
    match max {
        Some(max) if limit > max => Err(ValidationError::LimitTooLarge { limit, max }),
        _ => Ok(()),
    }
}
