use crate::{
    Code, Link, NewCode, NewPost, OwnerId, PageRequest, Post, PostId, PostStore, PostSummary, StoreError, Tag, TagId,
    TagRef,
};
use ::chrono::{DateTime, Duration, Utc};
use ::itertools::Itertools;
use ::std::collections::{BTreeMap, BTreeSet};
use ::std::sync::{Mutex, MutexGuard};

/// In-process [`PostStore`] keeping every table in ordered maps behind one lock.
#[derive(Debug, Default)]
pub struct MemoryPostStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    fault: Option<String>,
    next_id: i64,
    last_created_at: Option<DateTime<Utc>>,
    posts: BTreeMap<PostId, PostRow>,
    links: BTreeMap<i64, (PostId, String)>,
    codes: BTreeMap<i64, (PostId, NewCode)>,
    tags: BTreeMap<TagId, TagRow>,
    post_tags: BTreeSet<(PostId, TagId)>,
}

#[derive(Debug)]
struct PostRow {
    owner: OwnerId,
    title: String,
    description: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct TagRow {
    owner: OwnerId,
    description: String,
    created_at: DateTime<Utc>,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a post with a caller-chosen `created_at`, bypassing the store clock.
    /// Used to seed fixtures, including posts that share a timestamp. Later
    /// clock-assigned timestamps still land after the newest seeded one.
    pub fn insert_post_at(
        &self,
        owner: &OwnerId,
        post: &NewPost,
        created_at: DateTime<Utc>,
    ) -> Result<PostId, StoreError> {
        let mut inner = self.lock()?;
        let post_id = inner.insert_post(owner, post, created_at)?;
        inner.last_created_at = inner.last_created_at.max(Some(created_at));
        Ok(post_id)
    }

    /// Makes every following call fail with `message` until [`MemoryPostStore::recover`].
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fault = Some(message.into());
        }
    }

    pub fn recover(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fault = None;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::backend("memory store lock poisoned"))?;
        if let Some(message) = inner.fault.clone() {
            return Err(StoreError::Backend(message));
        }
        Ok(inner)
    }
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Wall clock, nudged forward so assigned timestamps never repeat or go back.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }

    fn insert_post(&mut self, owner: &OwnerId, post: &NewPost, created_at: DateTime<Utc>) -> Result<PostId, StoreError> {
        let tags = post.distinct_tags();
        for tag in &tags {
            if let TagRef::Existing(tag_id) = tag {
                if !self.tags.get(tag_id).is_some_and(|row| &row.owner == owner) {
                    return Err(StoreError::backend(format!("tag {tag_id} does not exist")));
                }
            }
        }

        let post_id = self.next_id();
        self.posts.insert(
            post_id,
            PostRow {
                owner: owner.clone(),
                title: post.title.clone(),
                description: post.description.clone(),
                created_at,
            },
        );
        for tag in tags {
            let tag_id = match tag {
                TagRef::Existing(tag_id) => tag_id,
                TagRef::New(description) => self.find_or_create_tag(owner, &description).id,
            };
            self.post_tags.insert((post_id, tag_id));
        }
        for link in &post.links {
            let id = self.next_id();
            self.links.insert(id, (post_id, link.clone()));
        }
        for code in &post.codes {
            let id = self.next_id();
            self.codes.insert(id, (post_id, code.clone()));
        }
        Ok(post_id)
    }

    fn find_or_create_tag(&mut self, owner: &OwnerId, description: &str) -> Tag {
        let existing = self
            .tags
            .iter()
            .find(|(_, row)| &row.owner == owner && row.description == description)
            .map(|(id, row)| tag(*id, row));
        if let Some(existing) = existing {
            return existing;
        }

        let id = self.next_id();
        let row = TagRow {
            owner: owner.clone(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        let created = tag(id, &row);
        self.tags.insert(id, row);
        created
    }

    fn post_tags(&self, post_id: PostId) -> Vec<Tag> {
        self.post_tags
            .range((post_id, TagId::MIN)..=(post_id, TagId::MAX))
            .filter_map(|(_, tag_id)| self.tags.get(tag_id).map(|row| tag(*tag_id, row)))
            .collect()
    }

    fn summary(&self, post_id: PostId, row: &PostRow) -> PostSummary {
        PostSummary {
            id: post_id,
            title: row.title.clone(),
            tags: self.post_tags(post_id).into_iter().map(|tag| tag.description).collect(),
            created_at: row.created_at,
        }
    }

    fn summaries(&self, owner: &OwnerId) -> Vec<PostSummary> {
        self.posts
            .iter()
            .filter(|(_, row)| &row.owner == owner)
            .map(|(id, row)| self.summary(*id, row))
            .collect()
    }
}

fn tag(id: TagId, row: &TagRow) -> Tag {
    Tag {
        id,
        description: row.description.clone(),
        created_at: row.created_at,
    }
}

impl PostStore for MemoryPostStore {
    fn page_posts(&self, owner: &OwnerId, request: &PageRequest) -> Result<Vec<PostSummary>, StoreError> {
        let inner = self.lock()?;
        let mut rows = inner.summaries(owner);
        match request.cursor {
            None => rows.sort_by(|a, b| b.key().cmp(&a.key())),
            Some(cursor) => {
                rows.retain(|row| request.direction.admits(&cursor, &row.key()));
                rows.sort_by(|a, b| request.direction.store_order(&a.key(), &b.key()));
            }
        }
        rows.truncate(request.limit as usize);
        Ok(rows)
    }

    fn posts_by_owner(&self, owner: &OwnerId) -> Result<Vec<PostSummary>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .summaries(owner)
            .into_iter()
            .sorted_by(|a, b| b.key().cmp(&a.key()))
            .collect())
    }

    fn create_post(&self, owner: &OwnerId, post: &NewPost) -> Result<PostId, StoreError> {
        let mut inner = self.lock()?;
        let created_at = inner.next_created_at();
        inner.insert_post(owner, post, created_at)
    }

    fn post_for_owner(&self, owner: &OwnerId, post_id: PostId) -> Result<Option<Post>, StoreError> {
        let inner = self.lock()?;
        let Some(row) = inner.posts.get(&post_id).filter(|row| &row.owner == owner) else {
            return Ok(None);
        };
        Ok(Some(Post {
            id: post_id,
            owner: row.owner.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            created_at: row.created_at,
            tags: inner.post_tags(post_id),
            links: inner
                .links
                .iter()
                .filter(|(_, (post, _))| *post == post_id)
                .map(|(id, (_, link))| Link {
                    id: *id,
                    link: link.clone(),
                })
                .collect(),
            codes: inner
                .codes
                .iter()
                .filter(|(_, (post, _))| *post == post_id)
                .map(|(id, (_, code))| Code {
                    id: *id,
                    code: code.code.clone(),
                    description: code.description.clone(),
                    language: code.language.clone(),
                })
                .collect(),
        }))
    }

    fn owns_post(&self, owner: &OwnerId, post_id: PostId) -> Result<bool, StoreError> {
        let inner = self.lock()?;
        Ok(inner.posts.get(&post_id).is_some_and(|row| &row.owner == owner))
    }

    fn delete_post(&self, post_id: PostId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.posts.remove(&post_id);
        inner.links.retain(|_, (post, _)| *post != post_id);
        inner.codes.retain(|_, (post, _)| *post != post_id);
        inner.post_tags.retain(|(post, _)| *post != post_id);
        Ok(())
    }

    fn update_title(&self, post_id: PostId, title: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(row) = inner.posts.get_mut(&post_id) {
            row.title = title.to_string();
        }
        Ok(())
    }

    fn update_description(&self, post_id: PostId, description: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(row) = inner.posts.get_mut(&post_id) {
            row.description = description.to_string();
        }
        Ok(())
    }

    fn add_link(&self, post_id: PostId, link: &str) -> Result<i64, StoreError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        inner.links.insert(id, (post_id, link.to_string()));
        Ok(id)
    }

    fn update_link(&self, post_id: PostId, link_id: i64, link: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        match inner.links.get_mut(&link_id) {
            Some((post, current)) if *post == post_id => {
                *current = link.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_link(&self, post_id: PostId, link_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if inner.links.get(&link_id).is_some_and(|(post, _)| *post == post_id) {
            inner.links.remove(&link_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn add_code(&self, post_id: PostId, code: &NewCode) -> Result<i64, StoreError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        inner.codes.insert(id, (post_id, code.clone()));
        Ok(id)
    }

    fn update_code(&self, post_id: PostId, code_id: i64, code: &NewCode) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        match inner.codes.get_mut(&code_id) {
            Some((post, current)) if *post == post_id => {
                *current = code.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_code(&self, post_id: PostId, code_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if inner.codes.get(&code_id).is_some_and(|(post, _)| *post == post_id) {
            inner.codes.remove(&code_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn tags(&self, owner: &OwnerId) -> Result<Vec<Tag>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tags
            .iter()
            .filter(|(_, row)| &row.owner == owner)
            .map(|(id, row)| tag(*id, row))
            .collect())
    }

    fn tag(&self, owner: &OwnerId, tag_id: TagId) -> Result<Option<Tag>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tags
            .get(&tag_id)
            .filter(|row| &row.owner == owner)
            .map(|row| tag(tag_id, row)))
    }

    fn find_or_create_tag(&self, owner: &OwnerId, description: &str) -> Result<Tag, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.find_or_create_tag(owner, description))
    }

    fn link_tag(&self, post_id: PostId, tag_id: TagId) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.post_tags.insert((post_id, tag_id)))
    }

    fn unlink_tag(&self, post_id: PostId, tag_id: TagId) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.post_tags.remove(&(post_id, tag_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CursorDirection, PageCursor};
    use ::chrono::TimeZone;

    fn owner() -> OwnerId {
        OwnerId::from("uid-1")
    }

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            description: "notes".into(),
            tags: vec![],
            links: vec![],
            codes: vec![],
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn assigned_timestamps_strictly_increase() {
        let store = MemoryPostStore::new();
        let ids = (0..5)
            .map(|i| store.create_post(&owner(), &new_post(&format!("p{i}"))).unwrap())
            .collect_vec();
        let listed = store.posts_by_owner(&owner()).unwrap();
        assert_eq!(listed.iter().map(|post| post.id).collect_vec(), ids.into_iter().rev().collect_vec());
        assert!(listed.windows(2).all(|pair| pair[0].created_at > pair[1].created_at));
    }

    #[test]
    fn created_posts_land_after_future_seeded_posts() {
        let store = MemoryPostStore::new();
        let future = Utc::now() + Duration::days(365);
        let seeded = store.insert_post_at(&owner(), &new_post("scheduled"), future).unwrap();
        let created = store.create_post(&owner(), &new_post("fresh")).unwrap();

        let listed = store.posts_by_owner(&owner()).unwrap();
        assert_eq!(listed.iter().map(|post| post.id).collect_vec(), vec![created, seeded]);
        assert!(listed[0].created_at > future);
    }

    #[test]
    fn backward_rows_come_oldest_first_and_include_the_boundary() {
        let store = MemoryPostStore::new();
        let ids = (0..4)
            .map(|i| store.insert_post_at(&owner(), &new_post("p"), at(i)).unwrap())
            .collect_vec();
        let boundary = PageCursor::new(at(1), ids[1]);
        let rows = store
            .page_posts(
                &owner(),
                &PageRequest {
                    cursor: Some(boundary),
                    direction: CursorDirection::Backward,
                    limit: 9,
                },
            )
            .unwrap();
        assert_eq!(rows.iter().map(|row| row.id).collect_vec(), vec![ids[1], ids[2], ids[3]]);
    }

    #[test]
    fn other_owners_posts_are_invisible() {
        let store = MemoryPostStore::new();
        let mine = store.create_post(&owner(), &new_post("mine")).unwrap();
        let theirs = store.create_post(&OwnerId::from("uid-2"), &new_post("theirs")).unwrap();

        assert!(store.owns_post(&owner(), mine).unwrap());
        assert!(!store.owns_post(&owner(), theirs).unwrap());
        assert!(store.post_for_owner(&owner(), theirs).unwrap().is_none());
        assert_eq!(store.posts_by_owner(&owner()).unwrap().len(), 1);
    }

    #[test]
    fn delete_cascades_but_keeps_tags() {
        let store = MemoryPostStore::new();
        let mut post = new_post("with children");
        post.tags = vec![TagRef::New("rust".into())];
        post.links = vec!["https://docs.rs".into()];
        post.codes = vec![NewCode {
            code: "let x = 1;".into(),
            description: "binding".into(),
            language: "rust".into(),
        }];
        let post_id = store.create_post(&owner(), &post).unwrap();

        let stored = store.post_for_owner(&owner(), post_id).unwrap().unwrap();
        assert_eq!(stored.tags.len(), 1);
        assert_eq!(stored.links.len(), 1);
        assert_eq!(stored.codes.len(), 1);

        store.delete_post(post_id).unwrap();
        assert!(store.post_for_owner(&owner(), post_id).unwrap().is_none());
        assert!(!store.delete_link(post_id, stored.links[0].id).unwrap());
        assert_eq!(store.tags(&owner()).unwrap().len(), 1);
    }

    #[test]
    fn unknown_existing_tag_fails_without_inserting() {
        let store = MemoryPostStore::new();
        let mut post = new_post("bad tag");
        post.tags = vec![TagRef::Existing(404)];
        assert!(store.create_post(&owner(), &post).is_err());
        assert!(store.posts_by_owner(&owner()).unwrap().is_empty());
    }

    #[test]
    fn injected_fault_fails_until_recovered() {
        let store = MemoryPostStore::new();
        store.fail_with("database is down");
        assert_eq!(
            store.posts_by_owner(&owner()),
            Err(StoreError::backend("database is down"))
        );
        store.recover();
        assert_eq!(store.posts_by_owner(&owner()), Ok(vec![]));
    }

    #[test]
    fn tags_are_found_before_created() {
        let store = MemoryPostStore::new();
        let first = store.find_or_create_tag(&owner(), "sql").unwrap();
        let again = store.find_or_create_tag(&owner(), "sql").unwrap();
        let other = store.find_or_create_tag(&OwnerId::from("uid-2"), "sql").unwrap();
        assert_eq!(first, again);
        assert_ne!(first.id, other.id);
    }
}
