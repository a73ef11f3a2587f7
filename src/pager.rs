use crate::{derive_next_cursor, CursorDirection, PageCursor, PageQuery, PostStore, PostSummary, Result};

/// User-facing notice for a paging action that issued no request.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, IsVariant, PartialEq)]
pub enum Notice {
    #[display(fmt = "already on the first page")]
    AlreadyFirstPage,
    #[display(fmt = "no more posts")]
    NoMorePages,
}

#[derive(Clone, Copy, Debug, Eq, Hash, IsVariant, PartialEq)]
pub enum Step {
    Loaded,
    Notice(Notice),
}

/// Paging state of one view over an owner's posts.
///
/// The page index is advisory and only drives the guards; the position that
/// matters is the boundary cursor of each page. `boundaries[i]` is the oldest
/// row of page `i`, which is the cursor that fetched page `i + 1` and the cursor
/// that fetches page `i` again when paging back. Every method takes `&mut self`,
/// so no two retrievals can be outstanding for the same view.
#[derive(Debug)]
pub struct Pager<'s, S: ?Sized> {
    query: PageQuery<'s, S>,
    index: u32,
    displayed: Vec<PostSummary>,
    boundaries: Vec<PageCursor>,
    exhausted: bool,
}

impl<'s, S: PostStore + ?Sized> Pager<'s, S> {
    pub fn new(query: PageQuery<'s, S>) -> Self {
        Self {
            query,
            index: 0,
            displayed: Vec::new(),
            boundaries: Vec::new(),
            exhausted: false,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn displayed(&self) -> &[PostSummary] {
        &self.displayed
    }

    pub fn can_next(&self) -> bool {
        !self.exhausted
    }

    pub fn can_previous(&self) -> bool {
        self.index > 0
    }

    /// Loads the newest page and forgets any earlier position.
    pub fn load_first(&mut self) -> Result<&[PostSummary]> {
        let page = self.query.fetch_page(None, CursorDirection::Forward)?;
        self.index = 0;
        self.boundaries.clear();
        self.exhausted = page.posts.is_empty();
        self.displayed = page.posts;
        Ok(&self.displayed)
    }

    pub fn next(&mut self) -> Result<Step> {
        if self.exhausted {
            return Ok(Step::Notice(Notice::NoMorePages));
        }
        let Some(cursor) = derive_next_cursor(&self.displayed, CursorDirection::Forward) else {
            self.exhausted = true;
            return Ok(Step::Notice(Notice::NoMorePages));
        };

        self.index += 1;
        let page = match self.query.fetch_page(Some(cursor), CursorDirection::Forward) {
            Ok(page) => page,
            Err(err) => {
                self.index -= 1;
                return Err(err);
            }
        };

        if page.is_exhausted() {
            self.index -= 1;
            self.exhausted = true;
            tracing::debug!(owner = %self.query.owner(), index = self.index, "reached the last page");
            return Ok(Step::Notice(Notice::NoMorePages));
        }

        self.boundaries.push(cursor);
        self.displayed = page.posts;
        Ok(Step::Loaded)
    }

    pub fn previous(&mut self) -> Result<Step> {
        let cursor = match (self.index, self.boundaries.last()) {
            (0, _) | (_, None) => return Ok(Step::Notice(Notice::AlreadyFirstPage)),
            (_, Some(cursor)) => *cursor,
        };

        self.index -= 1;
        let page = match self.query.fetch_page(Some(cursor), CursorDirection::Backward) {
            Ok(page) => page,
            Err(err) => {
                self.index += 1;
                return Err(err);
            }
        };

        self.boundaries.pop();
        self.exhausted = false;
        self.displayed = page.posts;
        Ok(Step::Loaded)
    }
}
