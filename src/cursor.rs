use crate::ValidationError;
use ::base64::{engine::general_purpose, Engine as _};
use ::chrono::{DateTime, SecondsFormat, Utc};
use ::std::cmp::Ordering;
use ::std::fmt;

/// Compound key `(created_at, id)` of the boundary row of a page.
///
/// `created_at` is the primary ordering dimension and `id` breaks ties between
/// posts sharing a timestamp, so the key is a total order over an owner's posts.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: i64,
}

impl PageCursor {
    pub fn new(created_at: DateTime<Utc>, id: i64) -> Self {
        Self { created_at, id }
    }

    /// Opaque token handed to clients in place of the raw key.
    pub fn encode(&self) -> String {
        let raw = format!(
            "ts:{},id:{}",
            self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.id
        );
        general_purpose::STANDARD.encode(raw)
    }

    pub fn decode(token: &str) -> Result<Self, ValidationError> {
        let bytes = general_purpose::STANDARD
            .decode(token)
            .map_err(|err| ValidationError::CursorToken(err.to_string()))?;
        let raw = String::from_utf8(bytes).map_err(|err| ValidationError::CursorToken(err.to_string()))?;

        let (ts, id) = raw
            .split_once(',')
            .ok_or_else(|| ValidationError::CursorToken("expected two components".into()))?;
        let ts = ts
            .strip_prefix("ts:")
            .ok_or_else(|| ValidationError::CursorToken("missing ts prefix".into()))?;
        let id = id
            .strip_prefix("id:")
            .ok_or_else(|| ValidationError::CursorToken("missing id prefix".into()))?;

        let created_at = DateTime::parse_from_rfc3339(ts)
            .map_err(|err| ValidationError::CursorToken(format!("invalid timestamp: {err}")))?
            .with_timezone(&Utc);
        let id = id
            .parse::<i64>()
            .map_err(|err| ValidationError::CursorToken(format!("invalid id: {err}")))?;

        Ok(Self { created_at, id })
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.created_at.to_rfc3339(), self.id)
    }
}

impl Ord for PageCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.created_at != other.created_at {
            self.created_at.cmp(&other.created_at)
        } else {
            self.id.cmp(&other.id)
        }
    }
}

impl PartialOrd for PageCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `Forward` pages towards older posts, `Backward` towards newer ones.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, IsVariant, Ord, PartialEq, PartialOrd, Serialize)]
#[cfg_attr(feature = "async-graphql", derive(crate::async_graphql::Enum))]
pub enum CursorDirection {
    #[default]
    Forward,
    Backward,
}

impl CursorDirection {
    /// Whether a row keyed `key` lies on this direction's side of `cursor`. Forward
    /// excludes the cursor row; backward includes it so it reappears when paging back.
    pub fn admits(self, cursor: &PageCursor, key: &PageCursor) -> bool {
        match self {
            Self::Forward => key < cursor,
            Self::Backward => key >= cursor,
        }
    }

    /// Order in which the store yields rows for a request carrying a cursor.
    pub fn store_order(self, lhs: &PageCursor, rhs: &PageCursor) -> Ordering {
        match self {
            Self::Forward => rhs.cmp(lhs),
            Self::Backward => lhs.cmp(rhs),
        }
    }
}

/// Nullable cursor components as they arrive from a client.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CursorParts {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub id: Option<i64>,
}

impl CursorParts {
    /// Both components or neither; a lone component is rejected.
    pub fn validate(self) -> Result<Option<PageCursor>, ValidationError> {
        match (self.created_at, self.id) {
            (Some(created_at), Some(id)) => Ok(Some(PageCursor { created_at, id })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ValidationError::PartialCursor { present: "created_at" }),
            (None, Some(_)) => Err(ValidationError::PartialCursor { present: "id" }),
        }
    }
}

impl From<PageCursor> for CursorParts {
    fn from(value: PageCursor) -> Self {
        Self {
            created_at: Some(value.created_at),
            id: Some(value.id),
        }
    }
}

impl From<Option<PageCursor>> for CursorParts {
    fn from(value: Option<PageCursor>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn orders_by_time_then_id() {
        let a = PageCursor::new(at(10), 7);
        let b = PageCursor::new(at(10), 8);
        let c = PageCursor::new(at(11), 1);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.cmp(&a), Ordering::Equal);
    }

    #[test]
    fn forward_is_strict_and_backward_is_inclusive() {
        let cursor = PageCursor::new(at(10), 5);
        let same = cursor;
        let older = PageCursor::new(at(10), 4);
        let newer = PageCursor::new(at(10), 6);

        assert!(CursorDirection::Forward.admits(&cursor, &older));
        assert!(!CursorDirection::Forward.admits(&cursor, &same));
        assert!(!CursorDirection::Forward.admits(&cursor, &newer));

        assert!(CursorDirection::Backward.admits(&cursor, &same));
        assert!(CursorDirection::Backward.admits(&cursor, &newer));
        assert!(!CursorDirection::Backward.admits(&cursor, &older));
    }

    #[test]
    fn lone_component_is_rejected() {
        let only_time = CursorParts {
            created_at: Some(at(1)),
            id: None,
        };
        let only_id = CursorParts {
            created_at: None,
            id: Some(3),
        };
        assert_eq!(
            only_time.validate(),
            Err(ValidationError::PartialCursor { present: "created_at" })
        );
        assert_eq!(only_id.validate(), Err(ValidationError::PartialCursor { present: "id" }));
        assert_eq!(CursorParts::default().validate(), Ok(None));
    }

    #[test]
    fn token_keeps_sub_second_precision() {
        let cursor = PageCursor::new(Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap(), 42);
        let decoded = PageCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn garbage_tokens_are_validation_errors() {
        assert!(matches!(
            PageCursor::decode("not base64!"),
            Err(ValidationError::CursorToken(_))
        ));
        let no_id = general_purpose::STANDARD.encode("ts:2025-11-10T14:30:00Z");
        assert!(matches!(PageCursor::decode(&no_id), Err(ValidationError::CursorToken(_))));
        let bad_id = general_purpose::STANDARD.encode("ts:2025-11-10T14:30:00Z,id:x");
        assert!(matches!(PageCursor::decode(&bad_id), Err(ValidationError::CursorToken(_))));
    }
}
