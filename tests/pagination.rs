use ::chrono::{DateTime, TimeZone, Utc};
use ::itertools::Itertools;
use ::postbook::*;

fn owner() -> OwnerId {
    OwnerId::from("uid-1")
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_762_900_000 + secs, 0).unwrap()
}

fn new_post(title: String) -> NewPost {
    NewPost {
        title,
        description: "notes".into(),
        tags: vec![TagRef::New("rust".into())],
        links: vec![],
        codes: vec![],
    }
}

/// `count` posts with unique timestamps; returned ids are newest first, so index
/// `i` is "post i" in display order.
fn seeded(count: i64) -> (MemoryPostStore, Vec<PostId>) {
    let store = MemoryPostStore::new();
    let mut ids = (0..count)
        .map(|i| {
            store
                .insert_post_at(&owner(), &new_post(format!("post {i}")), at(i))
                .unwrap()
        })
        .collect_vec();
    ids.reverse();
    (store, ids)
}

fn ids(page: &Page) -> Vec<PostId> {
    page.posts.iter().map(|post| post.id).collect()
}

fn shown(pager: &Pager<'_, MemoryPostStore>) -> Vec<PostId> {
    pager.displayed().iter().map(|post| post.id).collect()
}

#[test]
fn twenty_posts_in_pages_of_nine() {
    let (store, newest_first) = seeded(20);
    let query = PageQuery::new(&store, owner(), 9).unwrap();

    let first = query.fetch_page(None, CursorDirection::Forward).unwrap();
    assert_eq!(ids(&first), newest_first[0..9]);
    let cursor8 = first.next_cursor().unwrap();
    assert_eq!(cursor8.id, newest_first[8]);

    let second = query.fetch_page(Some(cursor8), CursorDirection::Forward).unwrap();
    assert_eq!(ids(&second), newest_first[9..18]);

    let back = query.fetch_page(Some(cursor8), CursorDirection::Backward).unwrap();
    assert_eq!(back.posts, first.posts);

    let third = query
        .fetch_page(second.next_cursor(), CursorDirection::Forward)
        .unwrap();
    assert_eq!(ids(&third), newest_first[18..20]);
}

#[test]
fn pager_walks_twenty_posts_and_back() {
    let (store, newest_first) = seeded(20);
    let mut pager = Pager::new(PageQuery::new(&store, owner(), 9).unwrap());

    pager.load_first().unwrap();
    assert_eq!(shown(&pager), newest_first[0..9]);
    pager.next().unwrap();
    assert_eq!(shown(&pager), newest_first[9..18]);
    pager.previous().unwrap();
    assert_eq!(shown(&pager), newest_first[0..9]);
    assert!(!pager.can_previous());
}

#[test]
fn three_posts_exhaust_after_one_page() {
    let (store, newest_first) = seeded(3);
    let query = PageQuery::new(&store, owner(), 9).unwrap();

    let first = query.fetch_page(None, CursorDirection::Forward).unwrap();
    assert_eq!(ids(&first), newest_first);
    let rest = query
        .fetch_page(first.next_cursor(), CursorDirection::Forward)
        .unwrap();
    assert!(rest.is_exhausted());

    let mut pager = Pager::new(query);
    pager.load_first().unwrap();
    assert_eq!(pager.next().unwrap(), Step::Notice(Notice::NoMorePages));
    assert!(!pager.can_next());
    assert_eq!(pager.displayed().len(), 3);
}

#[test]
fn shared_timestamps_are_neither_duplicated_nor_skipped() {
    let store = MemoryPostStore::new();
    let mut created = Vec::new();
    for i in 0..7 {
        // every second post shares its timestamp with the next one
        let id = store
            .insert_post_at(&owner(), &new_post(format!("post {i}")), at(i / 2))
            .unwrap();
        created.push(id);
    }
    let query = PageQuery::new(&store, owner(), 2).unwrap();

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = query.fetch_page(cursor, CursorDirection::Forward).unwrap();
        if page.is_exhausted() {
            break;
        }
        assert!(page.posts.iter().tuple_windows().all(|(a, b)| a.key() > b.key()));
        seen.extend(ids(&page));
        cursor = page.next_cursor();
    }

    assert_eq!(seen.len(), created.len());
    assert_eq!(seen.iter().sorted().collect_vec(), created.iter().sorted().collect_vec());
    assert_eq!(seen.iter().unique().count(), seen.len());
}

#[test]
fn forward_never_reaches_the_cursor() {
    let (store, _) = seeded(12);
    let query = PageQuery::new(&store, owner(), 4).unwrap();
    let everything = store.posts_by_owner(&owner()).unwrap();

    for post in &everything {
        let cursor = post.key();
        let page = query.fetch_page(Some(cursor), CursorDirection::Forward).unwrap();
        assert!(page.posts.iter().all(|row| row.key() < cursor));
    }
}

#[test]
fn backward_page_is_inclusive_and_shows_its_cursor_row_last() {
    let (store, _) = seeded(12);
    let query = PageQuery::new(&store, owner(), 4).unwrap();

    let mut cursor = None;
    loop {
        let page = query.fetch_page(cursor, CursorDirection::Forward).unwrap();
        let Some(next) = page.next_cursor() else {
            break;
        };
        let back = query.fetch_page(Some(next), CursorDirection::Backward).unwrap();
        // the inclusive boundary is the oldest row, so it is displayed last
        assert_eq!(back.posts.last().map(PostSummary::key), Some(next));
        assert!(back.posts.iter().tuple_windows().all(|(a, b)| a.key() > b.key()));
        cursor = Some(next);
    }
}

#[test]
fn full_forward_page_round_trips_through_backward() {
    let (store, _) = seeded(10);
    let query = PageQuery::new(&store, owner(), 3).unwrap();

    let mut cursor = None;
    for _ in 0..3 {
        let page = query.fetch_page(cursor, CursorDirection::Forward).unwrap();
        assert_eq!(page.posts.len(), 3);
        let derived = derive_next_cursor(&page.posts, CursorDirection::Forward);
        let again = query.fetch_page(derived, CursorDirection::Backward).unwrap();
        assert_eq!(again.posts, page.posts);
        cursor = derived;
    }
}

#[test]
fn one_component_cursor_is_rejected() {
    let (store, _) = seeded(3);
    let query = PageQuery::new(&store, owner(), 9).unwrap();
    let parts = CursorParts {
        created_at: Some(at(0)),
        id: None,
    };

    let err = query.fetch_page_parts(parts, CursorDirection::Backward).unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::PartialCursor { .. })));
    assert!(!err.is_transient());
}

#[test]
fn posts_of_other_owners_never_show() {
    let (store, _) = seeded(3);
    store
        .insert_post_at(&OwnerId::from("uid-2"), &new_post("theirs".into()), at(100))
        .unwrap();
    let query = PageQuery::new(&store, owner(), 9).unwrap();
    let page = query.fetch_page(None, CursorDirection::Forward).unwrap();
    assert_eq!(page.posts.len(), 3);
    assert!(page.posts.iter().all(|post| post.title != "theirs"));
}

#[test]
fn opaque_tokens_resume_paging() {
    let (store, newest_first) = seeded(5);
    let query = PageQuery::new(&store, owner(), 2).unwrap();
    let first = query.fetch_page(None, CursorDirection::Forward).unwrap();

    let token = first.next_cursor().unwrap().encode();
    let cursor = PageCursor::decode(&token).unwrap();
    let second = query
        .fetch_page_parts(cursor.into(), CursorDirection::Forward)
        .unwrap();
    assert_eq!(ids(&second), newest_first[2..4]);
}
