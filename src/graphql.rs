use crate::async_graphql::{self, Context, EmptySubscription, ErrorExtensions, Object, Schema, SimpleObject};
use crate::{
    derive_next_cursor, page_limit, CursorDirection, Error, FieldAddition, FieldRemoval, FieldUpdate, NewCode, NewPost,
    OwnerId, Page, PageCursor, PageQuery, Post, PostId, PostService, PostStore, PostSummary, Tag, TagId, TagRef,
};
use ::std::sync::Arc;

pub type SharedPostStore = Arc<dyn PostStore + Send + Sync>;

pub type PostbookSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Builds the schema over `store`. Hosts attach the caller's [`OwnerId`] to each request
/// with `Request::data`.
pub fn schema(store: SharedPostStore) -> PostbookSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .finish()
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct PageLimitValidator;

impl async_graphql::CustomValidator<u32> for PageLimitValidator {
    fn check(&self, value: &u32) -> Result<(), async_graphql::InputValueError<u32>> {
        crate::query::check_limit(*value, *crate::pagination_max_count()).map_err(|err| err.to_string().into())
    }
}

impl ErrorExtensions for Error {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, extensions| extensions.set("code", self.code()))
    }
}

fn extended<T>(result: crate::Result<T>) -> async_graphql::Result<T> {
    result.map_err(|err| err.extend())
}

fn caller<'c>(ctx: &Context<'c>) -> async_graphql::Result<(&'c (dyn PostStore + Send + Sync + 'c), &'c OwnerId)> {
    let store = ctx.data::<SharedPostStore>()?;
    let owner = ctx.data::<OwnerId>()?;
    Ok((store.as_ref(), owner))
}

type DynService<'c> = PostService<'c, dyn PostStore + Send + Sync + 'c>;

fn service<'c>(ctx: &Context<'c>) -> async_graphql::Result<(DynService<'c>, &'c OwnerId)> {
    let (store, owner) = caller(ctx)?;
    Ok((PostService::new(store), owner))
}

/// One page of posts with opaque cursor tokens.
#[derive(Clone, Debug, SimpleObject)]
pub struct PostPage {
    pub posts: Vec<PostSummary>,
    /// Key of the newest post on the page.
    pub start_cursor: Option<String>,
    /// Key of the oldest post on the page.
    pub end_cursor: Option<String>,
    /// Pass with `FORWARD` for the older page that follows.
    pub next_cursor: Option<String>,
    /// Pass with `BACKWARD` for the newer page that precedes; null on the newest page.
    pub previous_cursor: Option<String>,
    /// No posts exist beyond the requested cursor.
    pub exhausted: bool,
}

impl PostPage {
    fn new(page: Page, previous: Option<PageCursor>) -> Self {
        Self {
            start_cursor: page.posts.first().map(|post| post.key().encode()),
            end_cursor: page.posts.last().map(|post| post.key().encode()),
            next_cursor: derive_next_cursor(&page.posts, CursorDirection::Forward).map(|cursor| cursor.encode()),
            previous_cursor: previous.map(|cursor| cursor.encode()),
            exhausted: page.is_exhausted(),
            posts: page.posts,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn posts(
        &self,
        ctx: &Context<'_>,
        cursor: Option<String>,
        #[graphql(default)] direction: CursorDirection,
        #[graphql(validator(custom = "PageLimitValidator"))] limit: Option<u32>,
    ) -> async_graphql::Result<PostPage> {
        let (store, owner) = caller(ctx)?;
        let cursor = extended(cursor.as_deref().map(PageCursor::decode).transpose().map_err(Error::from))?;
        let query = extended(PageQuery::new(store, owner.clone(), limit.unwrap_or_else(page_limit)))?;
        let page = extended(query.fetch_page(cursor, direction))?;
        let previous = extended(query.previous_cursor(&page))?;
        Ok(PostPage::new(page, previous))
    }

    async fn post(&self, ctx: &Context<'_>, id: PostId) -> async_graphql::Result<Post> {
        let (service, owner) = service(ctx)?;
        extended(service.post(owner, id))
    }

    async fn tags(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Tag>> {
        let (service, owner) = service(ctx)?;
        extended(service.tags(owner))
    }

    async fn all_posts(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<PostSummary>> {
        let (service, owner) = service(ctx)?;
        extended(service.all_posts(owner))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn create_post(&self, ctx: &Context<'_>, input: NewPost) -> async_graphql::Result<PostId> {
        let (service, owner) = service(ctx)?;
        extended(service.create_post(owner, &input))
    }

    async fn delete_post(&self, ctx: &Context<'_>, id: PostId) -> async_graphql::Result<bool> {
        let (service, owner) = service(ctx)?;
        extended(service.delete_post(owner, id)).map(|_| true)
    }

    async fn add_link(&self, ctx: &Context<'_>, post_id: PostId, link: String) -> async_graphql::Result<i64> {
        let (service, owner) = service(ctx)?;
        match extended(service.add_field(owner, post_id, &FieldAddition::Link(link)))? {
            crate::Added::Link(id) => Ok(id),
            _ => Err("link was not added".into()),
        }
    }

    async fn add_code(&self, ctx: &Context<'_>, post_id: PostId, code: NewCode) -> async_graphql::Result<i64> {
        let (service, owner) = service(ctx)?;
        match extended(service.add_field(owner, post_id, &FieldAddition::Code(code)))? {
            crate::Added::Code(id) => Ok(id),
            _ => Err("code was not added".into()),
        }
    }

    async fn add_tag(&self, ctx: &Context<'_>, post_id: PostId, tag: TagRef) -> async_graphql::Result<Tag> {
        let (service, owner) = service(ctx)?;
        match extended(service.add_field(owner, post_id, &FieldAddition::Tag(tag)))? {
            crate::Added::Tag(tag) => Ok(tag),
            _ => Err("tag was not added".into()),
        }
    }

    async fn update_title(&self, ctx: &Context<'_>, post_id: PostId, title: String) -> async_graphql::Result<bool> {
        let (service, owner) = service(ctx)?;
        extended(service.update_field(owner, post_id, &FieldUpdate::Title(title))).map(|_| true)
    }

    async fn update_description(
        &self,
        ctx: &Context<'_>,
        post_id: PostId,
        description: String,
    ) -> async_graphql::Result<bool> {
        let (service, owner) = service(ctx)?;
        extended(service.update_field(owner, post_id, &FieldUpdate::Description(description))).map(|_| true)
    }

    async fn update_link(&self, ctx: &Context<'_>, post_id: PostId, id: i64, link: String) -> async_graphql::Result<bool> {
        let (service, owner) = service(ctx)?;
        extended(service.update_field(owner, post_id, &FieldUpdate::Link { id, link })).map(|_| true)
    }

    async fn update_code(&self, ctx: &Context<'_>, post_id: PostId, id: i64, code: NewCode) -> async_graphql::Result<bool> {
        let (service, owner) = service(ctx)?;
        extended(service.update_field(owner, post_id, &FieldUpdate::Code { id, code })).map(|_| true)
    }

    async fn remove_link(&self, ctx: &Context<'_>, post_id: PostId, id: i64) -> async_graphql::Result<bool> {
        let (service, owner) = service(ctx)?;
        extended(service.remove_field(owner, post_id, FieldRemoval::Link(id))).map(|_| true)
    }

    async fn remove_code(&self, ctx: &Context<'_>, post_id: PostId, id: i64) -> async_graphql::Result<bool> {
        let (service, owner) = service(ctx)?;
        extended(service.remove_field(owner, post_id, FieldRemoval::Code(id))).map(|_| true)
    }

    async fn remove_tag(&self, ctx: &Context<'_>, post_id: PostId, tag_id: TagId) -> async_graphql::Result<bool> {
        let (service, owner) = service(ctx)?;
        extended(service.remove_field(owner, post_id, FieldRemoval::Tag(tag_id))).map(|_| true)
    }
}
