use crate::{
    database_url, Code, CursorDirection, Link, NewCode, NewPost, OwnerId, PageCursor, PageRequest, Post, PostId,
    PostStore, PostSummary, StoreError, Tag, TagId, TagRef,
};
use ::chrono::{DateTime, Utc};
use ::diesel::dsl::exists;
use ::diesel::pg::{Pg, PgConnection};
use ::diesel::prelude::*;
use ::diesel::sql_types::{BigInt, Text, Timestamptz};
use ::itertools::Itertools;
use ::std::sync::{Mutex, MutexGuard};

pub mod schema {
    ::diesel::table! {
        posts (id) {
            id -> Int8,
            uid -> Text,
            title -> Text,
            description -> Text,
            created_at -> Timestamptz,
        }
    }

    ::diesel::table! {
        tags (id) {
            id -> Int8,
            uid -> Text,
            description -> Text,
            created_at -> Timestamptz,
        }
    }

    ::diesel::table! {
        post_tags (post_id, tag_id) {
            post_id -> Int8,
            tag_id -> Int8,
        }
    }

    ::diesel::table! {
        links_in_post (id) {
            id -> Int8,
            post_id -> Int8,
            link -> Text,
        }
    }

    ::diesel::table! {
        codes_in_post (id) {
            id -> Int8,
            post_id -> Int8,
            code -> Text,
            description -> Text,
            language -> Text,
        }
    }

    ::diesel::joinable!(post_tags -> posts (post_id));
    ::diesel::joinable!(post_tags -> tags (tag_id));
    ::diesel::joinable!(links_in_post -> posts (post_id));
    ::diesel::joinable!(codes_in_post -> posts (post_id));

    ::diesel::allow_tables_to_appear_in_same_query!(posts, tags, post_tags, links_in_post, codes_in_post);
}

use schema::{codes_in_post, links_in_post, post_tags, posts, tags};

type SummaryColumns = (BigInt, Text, Timestamptz);
type SummaryRow = (PostId, String, DateTime<Utc>);

impl From<::diesel::result::Error> for StoreError {
    fn from(value: ::diesel::result::Error) -> Self {
        Self::Backend(value.to_string())
    }
}

/// [`PostStore`] over PostgreSQL. Calls are serialized on a single connection.
pub struct PgPostStore {
    conn: Mutex<PgConnection>,
}

impl PgPostStore {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        PgConnection::establish(database_url)
            .map(Self::new)
            .map_err(|err| StoreError::backend(err.to_string()))
    }

    /// Connects to `DATABASE_URL`.
    pub fn from_env() -> Result<Self, StoreError> {
        let url = database_url().map_err(|err| StoreError::backend(err.to_string()))?;
        let store = Self::connect(&url)?;
        tracing::info!("connected to postgres");
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, PgConnection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::backend("postgres connection lock poisoned"))
    }
}

/// The paged retrieval for one owner. Keys are compared as `(created_at, id)` tuples.
pub fn page_query<'a>(owner: &'a OwnerId, request: &PageRequest) -> posts::BoxedQuery<'a, Pg, SummaryColumns> {
    let query = posts::table
        .select((posts::id, posts::title, posts::created_at))
        .filter(posts::uid.eq(owner.as_str()))
        .limit(i64::from(request.limit))
        .into_boxed();

    let Some(PageCursor { created_at, id }) = request.cursor else {
        return query.order((posts::created_at.desc(), posts::id.desc()));
    };
    let same_instant = posts::created_at.eq(created_at);

    // forward excludes the cursor row; backward includes it, oldest first
    match request.direction {
        CursorDirection::Forward => query
            .filter(posts::created_at.lt(created_at).or(same_instant.and(posts::id.lt(id))))
            .order((posts::created_at.desc(), posts::id.desc())),
        CursorDirection::Backward => query
            .filter(posts::created_at.gt(created_at).or(same_instant.and(posts::id.ge(id))))
            .order((posts::created_at.asc(), posts::id.asc())),
    }
}

fn summaries(conn: &mut PgConnection, rows: Vec<SummaryRow>) -> QueryResult<Vec<PostSummary>> {
    let post_ids = rows.iter().map(|(id, _, _)| *id).collect_vec();
    let mut tags_by_post = post_tags::table
        .inner_join(tags::table)
        .filter(post_tags::post_id.eq_any(post_ids))
        .order((post_tags::post_id, tags::id))
        .select((post_tags::post_id, tags::description))
        .load::<(PostId, String)>(conn)?
        .into_iter()
        .into_group_map();

    Ok(rows
        .into_iter()
        .map(|(id, title, created_at)| PostSummary {
            id,
            title,
            tags: tags_by_post.remove(&id).unwrap_or_default(),
            created_at,
        })
        .collect())
}

fn owned_tag(conn: &mut PgConnection, owner: &OwnerId, tag_id: TagId) -> QueryResult<Option<Tag>> {
    tags::table
        .filter(tags::id.eq(tag_id).and(tags::uid.eq(owner.as_str())))
        .select((tags::id, tags::description, tags::created_at))
        .first::<Tag>(conn)
        .optional()
}

fn find_or_insert_tag(conn: &mut PgConnection, owner: &OwnerId, description: &str) -> QueryResult<Tag> {
    let existing = tags::table
        .filter(tags::uid.eq(owner.as_str()).and(tags::description.eq(description)))
        .select((tags::id, tags::description, tags::created_at))
        .first::<Tag>(conn)
        .optional()?;
    match existing {
        Some(tag) => Ok(tag),
        None => ::diesel::insert_into(tags::table)
            .values((tags::uid.eq(owner.as_str()), tags::description.eq(description)))
            .returning((tags::id, tags::description, tags::created_at))
            .get_result::<Tag>(conn),
    }
}

fn insert_post_tag(conn: &mut PgConnection, post_id: PostId, tag_id: TagId) -> QueryResult<bool> {
    let inserted = ::diesel::insert_into(post_tags::table)
        .values((post_tags::post_id.eq(post_id), post_tags::tag_id.eq(tag_id)))
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(inserted == 1)
}

fn insert_code(conn: &mut PgConnection, post_id: PostId, code: &NewCode) -> QueryResult<i64> {
    ::diesel::insert_into(codes_in_post::table)
        .values((
            codes_in_post::post_id.eq(post_id),
            codes_in_post::code.eq(&code.code),
            codes_in_post::description.eq(&code.description),
            codes_in_post::language.eq(&code.language),
        ))
        .returning(codes_in_post::id)
        .get_result(conn)
}

impl PostStore for PgPostStore {
    fn page_posts(&self, owner: &OwnerId, request: &PageRequest) -> Result<Vec<PostSummary>, StoreError> {
        let mut conn = self.conn()?;
        let rows = page_query(owner, request).load::<SummaryRow>(&mut *conn)?;
        Ok(summaries(&mut conn, rows)?)
    }

    fn posts_by_owner(&self, owner: &OwnerId) -> Result<Vec<PostSummary>, StoreError> {
        let mut conn = self.conn()?;
        let rows = posts::table
            .filter(posts::uid.eq(owner.as_str()))
            .order((posts::created_at.desc(), posts::id.desc()))
            .select((posts::id, posts::title, posts::created_at))
            .load::<SummaryRow>(&mut *conn)?;
        Ok(summaries(&mut conn, rows)?)
    }

    fn create_post(&self, owner: &OwnerId, post: &NewPost) -> Result<PostId, StoreError> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            let post_id = ::diesel::insert_into(posts::table)
                .values((
                    posts::uid.eq(owner.as_str()),
                    posts::title.eq(&post.title),
                    posts::description.eq(&post.description),
                ))
                .returning(posts::id)
                .get_result::<PostId>(conn)?;

            for tag in post.distinct_tags() {
                let tag_id = match tag {
                    TagRef::Existing(tag_id) => match owned_tag(conn, owner, tag_id)? {
                        Some(tag) => tag.id,
                        None => return Err(StoreError::backend(format!("tag {tag_id} does not exist"))),
                    },
                    TagRef::New(description) => find_or_insert_tag(conn, owner, &description)?.id,
                };
                insert_post_tag(conn, post_id, tag_id)?;
            }

            if !post.links.is_empty() {
                let links = post
                    .links
                    .iter()
                    .map(|link| (links_in_post::post_id.eq(post_id), links_in_post::link.eq(link)))
                    .collect_vec();
                ::diesel::insert_into(links_in_post::table).values(links).execute(conn)?;
            }
            for code in &post.codes {
                insert_code(conn, post_id, code)?;
            }
            Ok(post_id)
        })
    }

    fn post_for_owner(&self, owner: &OwnerId, post_id: PostId) -> Result<Option<Post>, StoreError> {
        let mut conn = self.conn()?;
        let conn = &mut *conn;
        let row = posts::table
            .filter(posts::id.eq(post_id).and(posts::uid.eq(owner.as_str())))
            .select((posts::id, posts::title, posts::description, posts::created_at))
            .first::<(PostId, String, String, DateTime<Utc>)>(conn)
            .optional()?;
        let Some((id, title, description, created_at)) = row else {
            return Ok(None);
        };

        let tags = post_tags::table
            .inner_join(tags::table)
            .filter(post_tags::post_id.eq(id))
            .order(tags::id)
            .select((tags::id, tags::description, tags::created_at))
            .load::<Tag>(conn)?;
        let links = links_in_post::table
            .filter(links_in_post::post_id.eq(id))
            .order(links_in_post::id)
            .select((links_in_post::id, links_in_post::link))
            .load::<Link>(conn)?;
        let codes = codes_in_post::table
            .filter(codes_in_post::post_id.eq(id))
            .order(codes_in_post::id)
            .select((
                codes_in_post::id,
                codes_in_post::code,
                codes_in_post::description,
                codes_in_post::language,
            ))
            .load::<Code>(conn)?;

        Ok(Some(Post {
            id,
            owner: owner.clone(),
            title,
            description,
            created_at,
            tags,
            links,
            codes,
        }))
    }

    fn owns_post(&self, owner: &OwnerId, post_id: PostId) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let owned = ::diesel::select(exists(
            posts::table.filter(posts::id.eq(post_id).and(posts::uid.eq(owner.as_str()))),
        ))
        .get_result::<bool>(&mut *conn)?;
        Ok(owned)
    }

    fn delete_post(&self, post_id: PostId) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            ::diesel::delete(post_tags::table.filter(post_tags::post_id.eq(post_id))).execute(conn)?;
            ::diesel::delete(links_in_post::table.filter(links_in_post::post_id.eq(post_id))).execute(conn)?;
            ::diesel::delete(codes_in_post::table.filter(codes_in_post::post_id.eq(post_id))).execute(conn)?;
            ::diesel::delete(posts::table.find(post_id)).execute(conn)?;
            Ok(())
        })
    }

    fn update_title(&self, post_id: PostId, title: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        ::diesel::update(posts::table.find(post_id))
            .set(posts::title.eq(title))
            .execute(&mut *conn)?;
        Ok(())
    }

    fn update_description(&self, post_id: PostId, description: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        ::diesel::update(posts::table.find(post_id))
            .set(posts::description.eq(description))
            .execute(&mut *conn)?;
        Ok(())
    }

    fn add_link(&self, post_id: PostId, link: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn()?;
        let id = ::diesel::insert_into(links_in_post::table)
            .values((links_in_post::post_id.eq(post_id), links_in_post::link.eq(link)))
            .returning(links_in_post::id)
            .get_result(&mut *conn)?;
        Ok(id)
    }

    fn update_link(&self, post_id: PostId, link_id: i64, link: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let updated = ::diesel::update(
            links_in_post::table.filter(links_in_post::id.eq(link_id).and(links_in_post::post_id.eq(post_id))),
        )
        .set(links_in_post::link.eq(link))
        .execute(&mut *conn)?;
        Ok(updated == 1)
    }

    fn delete_link(&self, post_id: PostId, link_id: i64) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let deleted = ::diesel::delete(
            links_in_post::table.filter(links_in_post::id.eq(link_id).and(links_in_post::post_id.eq(post_id))),
        )
        .execute(&mut *conn)?;
        Ok(deleted == 1)
    }

    fn add_code(&self, post_id: PostId, code: &NewCode) -> Result<i64, StoreError> {
        let mut conn = self.conn()?;
        Ok(insert_code(&mut conn, post_id, code)?)
    }

    fn update_code(&self, post_id: PostId, code_id: i64, code: &NewCode) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let updated = ::diesel::update(
            codes_in_post::table.filter(codes_in_post::id.eq(code_id).and(codes_in_post::post_id.eq(post_id))),
        )
        .set((
            codes_in_post::code.eq(&code.code),
            codes_in_post::description.eq(&code.description),
            codes_in_post::language.eq(&code.language),
        ))
        .execute(&mut *conn)?;
        Ok(updated == 1)
    }

    fn delete_code(&self, post_id: PostId, code_id: i64) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let deleted = ::diesel::delete(
            codes_in_post::table.filter(codes_in_post::id.eq(code_id).and(codes_in_post::post_id.eq(post_id))),
        )
        .execute(&mut *conn)?;
        Ok(deleted == 1)
    }

    fn tags(&self, owner: &OwnerId) -> Result<Vec<Tag>, StoreError> {
        let mut conn = self.conn()?;
        let tags = tags::table
            .filter(tags::uid.eq(owner.as_str()))
            .order(tags::id)
            .select((tags::id, tags::description, tags::created_at))
            .load::<Tag>(&mut *conn)?;
        Ok(tags)
    }

    fn tag(&self, owner: &OwnerId, tag_id: TagId) -> Result<Option<Tag>, StoreError> {
        let mut conn = self.conn()?;
        Ok(owned_tag(&mut conn, owner, tag_id)?)
    }

    fn find_or_create_tag(&self, owner: &OwnerId, description: &str) -> Result<Tag, StoreError> {
        let mut conn = self.conn()?;
        Ok(find_or_insert_tag(&mut conn, owner, description)?)
    }

    fn link_tag(&self, post_id: PostId, tag_id: TagId) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        Ok(insert_post_tag(&mut conn, post_id, tag_id)?)
    }

    fn unlink_tag(&self, post_id: PostId, tag_id: TagId) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let deleted = ::diesel::delete(post_tags::table.find((post_id, tag_id))).execute(&mut *conn)?;
        Ok(deleted == 1)
    }
}
