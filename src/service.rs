use crate::{
    Error, FieldAddition, FieldEdit, FieldRemoval, FieldUpdate, NewPost, OwnerId, Post, PostField, PostId, PostStore,
    PostSummary, Result, Tag, TagRef,
};

/// What an addition produced.
#[derive(Clone, Debug, Eq, IsVariant, PartialEq)]
pub enum Added {
    Link(i64),
    Code(i64),
    Tag(Tag),
}

/// Owner-checked operations on posts and their tags, links and code blocks.
///
/// Every operation that targets a post first verifies the caller owns it; a
/// missing post and a foreign post both surface as [`Error::NotFound`].
#[derive(Debug)]
pub struct PostService<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: PostStore + ?Sized> PostService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, owner, post), fields(owner = %owner))]
    pub fn create_post(&self, owner: &OwnerId, post: &NewPost) -> Result<PostId> {
        post.validate()?;
        let post_id = self.store.create_post(owner, post)?;
        tracing::info!(post_id, "post created");
        Ok(post_id)
    }

    pub fn post(&self, owner: &OwnerId, post_id: PostId) -> Result<Post> {
        self.store
            .post_for_owner(owner, post_id)?
            .ok_or(Error::NotFound { post_id })
    }

    pub fn all_posts(&self, owner: &OwnerId) -> Result<Vec<PostSummary>> {
        Ok(self.store.posts_by_owner(owner)?)
    }

    pub fn tags(&self, owner: &OwnerId) -> Result<Vec<Tag>> {
        Ok(self.store.tags(owner)?)
    }

    #[tracing::instrument(skip(self, owner), fields(owner = %owner))]
    pub fn delete_post(&self, owner: &OwnerId, post_id: PostId) -> Result<()> {
        self.check_owner(owner, post_id)?;
        self.store.delete_post(post_id)?;
        tracing::info!("post deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self, owner, addition), fields(owner = %owner, field = %addition.field()))]
    pub fn add_field(&self, owner: &OwnerId, post_id: PostId, addition: &FieldAddition) -> Result<Added> {
        addition.validate()?;
        self.check_owner(owner, post_id)?;

        let added = match addition {
            FieldAddition::Link(link) => Added::Link(self.store.add_link(post_id, link)?),
            FieldAddition::Code(code) => Added::Code(self.store.add_code(post_id, code)?),
            FieldAddition::Tag(tag) => Added::Tag(self.attach_tag(owner, post_id, tag)?),
        };
        tracing::info!("field item added");
        Ok(added)
    }

    #[tracing::instrument(skip(self, owner, update), fields(owner = %owner, field = %update.field()))]
    pub fn update_field(&self, owner: &OwnerId, post_id: PostId, update: &FieldUpdate) -> Result<()> {
        update.validate()?;
        self.check_owner(owner, post_id)?;

        match update {
            FieldUpdate::Title(title) => self.store.update_title(post_id, title)?,
            FieldUpdate::Description(description) => self.store.update_description(post_id, description)?,
            FieldUpdate::Link { id, link } => {
                if !self.store.update_link(post_id, *id, link)? {
                    return Err(Error::ItemNotFound {
                        field: PostField::Links,
                        id: *id,
                    });
                }
            }
            FieldUpdate::Code { id, code } => {
                if !self.store.update_code(post_id, *id, code)? {
                    return Err(Error::ItemNotFound {
                        field: PostField::Codes,
                        id: *id,
                    });
                }
            }
        }
        tracing::info!("field updated");
        Ok(())
    }

    #[tracing::instrument(skip(self, owner), fields(owner = %owner, field = %removal.field()))]
    pub fn remove_field(&self, owner: &OwnerId, post_id: PostId, removal: FieldRemoval) -> Result<()> {
        self.check_owner(owner, post_id)?;

        let removed = match removal {
            FieldRemoval::Link(id) => self.store.delete_link(post_id, id)?,
            FieldRemoval::Code(id) => self.store.delete_code(post_id, id)?,
            FieldRemoval::Tag(tag_id) => self.store.unlink_tag(post_id, tag_id)?,
        };
        if !removed {
            return Err(Error::ItemNotFound {
                field: removal.field(),
                id: removal.id(),
            });
        }
        tracing::info!("field item removed");
        Ok(())
    }

    /// Entry point for the field routes: `route` is the `[field]` path segment and
    /// must name the field `edit` targets. Only additions produce a value.
    pub fn edit_field(&self, owner: &OwnerId, post_id: PostId, route: &str, edit: &FieldEdit) -> Result<Option<Added>> {
        route.parse::<PostField>()?.check(edit.field())?;
        match edit {
            FieldEdit::Add(addition) => self.add_field(owner, post_id, addition).map(Some),
            FieldEdit::Update(update) => self.update_field(owner, post_id, update).map(|_| None),
            FieldEdit::Remove(removal) => self.remove_field(owner, post_id, *removal).map(|_| None),
        }
    }

    fn attach_tag(&self, owner: &OwnerId, post_id: PostId, tag: &TagRef) -> Result<Tag> {
        let tag = match tag {
            TagRef::Existing(tag_id) => self.store.tag(owner, *tag_id)?.ok_or(Error::ItemNotFound {
                field: PostField::Tags,
                id: *tag_id,
            })?,
            TagRef::New(description) => self.store.find_or_create_tag(owner, description.trim())?,
        };
        if !self.store.link_tag(post_id, tag.id)? {
            return Err(Error::Conflict {
                message: format!("tag {:?} already added", tag.description),
            });
        }
        Ok(tag)
    }

    fn check_owner(&self, owner: &OwnerId, post_id: PostId) -> Result<()> {
        if self.store.owns_post(owner, post_id)? {
            Ok(())
        } else {
            Err(Error::NotFound { post_id })
        }
    }
}
