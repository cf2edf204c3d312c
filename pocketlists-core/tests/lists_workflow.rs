use pocketlists_core::{
    parse_checklist, AppContext, AppSettings, Database, HeadlessSurface, PocketListsError, Theme,
};
use std::sync::Arc;
use tempfile::TempDir;

fn start(dir: &TempDir) -> AppContext {
    let settings = AppSettings {
        database_path: dir.path().join("lists.db").to_string_lossy().to_string(),
        share_import_wait_ms: 10,
    };
    AppContext::start(&settings, Arc::new(HeadlessSurface::new(Theme::Light, None))).unwrap()
}

#[tokio::test]
async fn groceries_hide_done_shows_only_open_items() {
    let dir = TempDir::new().unwrap();
    let ctx = start(&dir);
    ctx.ready().await;

    ctx.lists().create("Groceries").await.unwrap();
    ctx.list_items().create("Groceries", "Milk").await.unwrap();
    let eggs = ctx.list_items().create("Groceries", "Eggs").await.unwrap();
    let mut done = eggs.clone();
    done.is_done = true;
    ctx.list_items().update(&done).await.unwrap();

    let names: Vec<String> = ctx
        .list_items()
        .list_by_list("Groceries", true)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, vec!["Milk"]);
    assert_eq!(
        ctx.list_items().list_by_list("Groceries", false).await.unwrap().len(),
        2
    );

    assert!(!ctx.preferences().get_hide_done("Groceries").await.unwrap());
    ctx.preferences().set_hide_done("Groceries", true).await.unwrap();
    assert!(ctx.preferences().get_hide_done("Groceries").await.unwrap());
}

#[tokio::test]
async fn imported_list_is_deleted_with_all_items() {
    let dir = TempDir::new().unwrap();
    let ctx = start(&dir);

    let rows = parse_checklist("[ ] Milk\n[x] Eggs\n[ ] Bread\n[x] Tea");
    let summary = ctx.lists().import_from_text("Weekend", &rows).await.unwrap();
    assert_eq!(summary.imported, 4);
    ctx.ready().await;

    let items = ctx.list_items().list_by_list("Weekend", false).await.unwrap();
    assert_eq!(items.len(), 4);
    ctx.list_items().delete(&items[0]).await.unwrap();

    ctx.lists()
        .delete(&summary.list.id, &summary.list.rev)
        .await
        .unwrap();

    assert!(ctx.list_items().list_by_list("Weekend", false).await.unwrap().is_empty());
    assert!(ctx.list_items().find_removed(&items[0].id).await.is_err());
    assert!(!ctx.lists().name_exists("Weekend").await);
}

#[tokio::test]
async fn forced_cascade_failure_leaves_list_retryable() {
    let dir = TempDir::new().unwrap();
    let ctx = start(&dir);
    ctx.ready().await;
    let list = ctx.lists().create("Groceries").await.unwrap();
    ctx.list_items().create("Groceries", "Milk").await.unwrap();

    // A trigger makes every purge of this list's items fail.
    ctx.database()
        .with_connection(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER block_purge BEFORE DELETE ON list_items
                 BEGIN SELECT RAISE(ABORT, 'purge blocked'); END;",
            )
        })
        .await
        .unwrap();

    let err = ctx.lists().delete(&list.id, &list.rev).await.unwrap_err();
    assert!(matches!(err, PocketListsError::CascadeDelete { .. }));
    assert_eq!(ctx.lists().find_all().await.unwrap(), vec![list.clone()]);
    assert_eq!(
        ctx.list_items().list_by_list("Groceries", false).await.unwrap().len(),
        1
    );

    ctx.database()
        .with_connection(|conn| conn.execute_batch("DROP TRIGGER block_purge"))
        .await
        .unwrap();
    ctx.lists().delete(&list.id, &list.rev).await.unwrap();
    assert!(ctx.lists().find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn notes_survive_reopening_the_store() {
    let dir = TempDir::new().unwrap();
    let note = {
        let ctx = start(&dir);
        let note = ctx.notes().create("call the plumber").await.unwrap();
        ctx.shutdown().await;
        note
    };

    let db = Database::open(dir.path().join("lists.db")).unwrap();
    let reopened = pocketlists_core::NotesRepository::new(
        db.collection(),
        Arc::new(pocketlists_core::IdGenerator::new()),
    );
    assert_eq!(reopened.find(&note.id).await.unwrap(), note);
}
