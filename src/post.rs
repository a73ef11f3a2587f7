use crate::{PageCursor, ValidationError};
use ::chrono::{DateTime, Utc};
use ::itertools::Itertools;
use ::std::str::FromStr;

pub type PostId = i64;
pub type TagId = i64;

/// Identity of the signed-in user. Passed explicitly into every operation.
#[derive(Clone, Debug, Deserialize, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Row returned by paged and listing retrievals.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(feature = "async-graphql", derive(crate::async_graphql::SimpleObject))]
pub struct PostSummary {
    pub id: PostId,
    pub title: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PostSummary {
    pub fn key(&self) -> PageCursor {
        PageCursor::new(self.created_at, self.id)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(feature = "async-graphql", derive(crate::async_graphql::SimpleObject))]
#[cfg_attr(feature = "postgres", derive(::diesel::Queryable))]
pub struct Tag {
    pub id: TagId,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(feature = "async-graphql", derive(crate::async_graphql::SimpleObject))]
#[cfg_attr(feature = "postgres", derive(::diesel::Queryable))]
pub struct Link {
    pub id: i64,
    pub link: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(feature = "async-graphql", derive(crate::async_graphql::SimpleObject))]
#[cfg_attr(feature = "postgres", derive(::diesel::Queryable))]
pub struct Code {
    pub id: i64,
    pub code: String,
    pub description: String,
    pub language: String,
}

/// A post with everything attached to it, as shown on its detail page.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(feature = "async-graphql", derive(crate::async_graphql::SimpleObject))]
pub struct Post {
    pub id: PostId,
    #[cfg_attr(feature = "async-graphql", graphql(skip))]
    pub owner: OwnerId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub links: Vec<Link>,
    pub codes: Vec<Code>,
}

impl Post {
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            title: self.title.clone(),
            tags: self.tags.iter().map(|tag| tag.description.clone()).collect(),
            created_at: self.created_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(feature = "async-graphql", derive(crate::async_graphql::InputObject))]
pub struct NewCode {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub language: String,
}

impl NewCode {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_empty("code", &self.code)?;
        non_empty("language", &self.language)
    }
}

/// A tag to attach: one of the owner's existing tags, or a description to find or create.
#[derive(Clone, Debug, Deserialize, Eq, Hash, IsVariant, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "async-graphql", derive(crate::async_graphql::OneofObject))]
pub enum TagRef {
    Existing(TagId),
    New(String),
}

impl TagRef {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Existing(_) => Ok(()),
            Self::New(description) => non_empty("tag", description),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(feature = "async-graphql", derive(crate::async_graphql::InputObject))]
pub struct NewPost {
    pub title: String,
    pub description: String,
    #[serde(default)]
    #[cfg_attr(feature = "async-graphql", graphql(default))]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    #[cfg_attr(feature = "async-graphql", graphql(default))]
    pub links: Vec<String>,
    #[serde(default)]
    #[cfg_attr(feature = "async-graphql", graphql(default))]
    pub codes: Vec<NewCode>,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_empty("title", &self.title)?;
        non_empty("description", &self.description)?;
        self.tags.iter().try_for_each(TagRef::validate)?;
        self.links.iter().try_for_each(|link| non_empty("link", link))?;
        self.codes.iter().try_for_each(NewCode::validate)
    }

    /// Tags with duplicates removed, first occurrence kept. New tags compare by trimmed description.
    pub fn distinct_tags(&self) -> Vec<TagRef> {
        self.tags
            .iter()
            .map(|tag| match tag {
                TagRef::New(description) => TagRef::New(description.trim().to_string()),
                existing => existing.clone(),
            })
            .unique()
            .collect()
    }
}

/// Sub-resource named by the `[field]` segment of an edit route.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostField {
    #[display(fmt = "title")]
    Title,
    #[display(fmt = "description")]
    Description,
    #[display(fmt = "links")]
    Links,
    #[display(fmt = "codes")]
    Codes,
    #[display(fmt = "tags")]
    Tags,
}

impl PostField {
    pub fn check(self, given: PostField) -> Result<(), ValidationError> {
        if self == given {
            Ok(())
        } else {
            Err(ValidationError::FieldMismatch { expected: self, given })
        }
    }
}

impl FromStr for PostField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(Self::Title),
            "description" => Ok(Self::Description),
            "links" => Ok(Self::Links),
            "codes" => Ok(Self::Codes),
            "tags" => Ok(Self::Tags),
            other => Err(ValidationError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "field", content = "value")]
pub enum FieldAddition {
    #[serde(rename = "links")]
    Link(String),
    #[serde(rename = "codes")]
    Code(NewCode),
    #[serde(rename = "tags")]
    Tag(TagRef),
}

impl FieldAddition {
    pub fn field(&self) -> PostField {
        match self {
            Self::Link(_) => PostField::Links,
            Self::Code(_) => PostField::Codes,
            Self::Tag(_) => PostField::Tags,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Link(link) => non_empty("link", link),
            Self::Code(code) => {
                non_empty("code description", &code.description)?;
                code.validate()
            }
            Self::Tag(tag) => tag.validate(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "field", content = "value")]
pub enum FieldUpdate {
    #[serde(rename = "title")]
    Title(String),
    #[serde(rename = "description")]
    Description(String),
    #[serde(rename = "links")]
    Link { id: i64, link: String },
    #[serde(rename = "codes")]
    Code { id: i64, code: NewCode },
}

impl FieldUpdate {
    pub fn field(&self) -> PostField {
        match self {
            Self::Title(_) => PostField::Title,
            Self::Description(_) => PostField::Description,
            Self::Link { .. } => PostField::Links,
            Self::Code { .. } => PostField::Codes,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Title(title) => non_empty("title", title),
            Self::Description(description) => non_empty("description", description),
            Self::Link { link, .. } => non_empty("link", link),
            Self::Code { code, .. } => code.validate(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "field", content = "id")]
pub enum FieldRemoval {
    #[serde(rename = "links")]
    Link(i64),
    #[serde(rename = "codes")]
    Code(i64),
    #[serde(rename = "tags")]
    Tag(TagId),
}

impl FieldRemoval {
    pub fn field(&self) -> PostField {
        match self {
            Self::Link(_) => PostField::Links,
            Self::Code(_) => PostField::Codes,
            Self::Tag(_) => PostField::Tags,
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            Self::Link(id) | Self::Code(id) | Self::Tag(id) => id,
        }
    }
}

/// Body of a request to one of the `add`, `update` or `delete` field routes.
#[derive(Clone, Debug, Eq, From, IsVariant, PartialEq)]
pub enum FieldEdit {
    Add(FieldAddition),
    Update(FieldUpdate),
    Remove(FieldRemoval),
}

impl FieldEdit {
    pub fn field(&self) -> PostField {
        match self {
            Self::Add(addition) => addition.field(),
            Self::Update(update) => update.field(),
            Self::Remove(removal) => removal.field(),
        }
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty { field })
    } else {
        Ok(())
    }
}
