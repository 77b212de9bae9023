mod common;

use chore_sync_lib::domain::entities::NewAdHocChore;
use chore_sync_lib::domain::value_objects::{PhotoStatus, StorageId, TimeSlot, UploadStatus};
use chore_sync_lib::infrastructure::remote::BackendOp;
use chore_sync_lib::shared::error::AppError;
use common::{captured_photo, id, memory_app, scheduled_chore};

#[tokio::test]
async fn completed_chore_photo_is_uploaded_attached_and_cached() {
    let app = memory_app().await;
    let date = app.state.daily_chore_service.today();
    let chore_id = id("d-eggs");
    app.backend
        .seed_daily_chore(scheduled_chore("d-eggs", &date, 10))
        .await;
    app.state
        .hydration
        .pull_daily_chores(&date)
        .await
        .expect("pull daily list");

    app.state
        .daily_chore_service
        .complete_with_photo(&chore_id, captured_photo(&chore_id))
        .await
        .expect("complete with photo");
    let local = app
        .state
        .daily_chore_service
        .get(&chore_id)
        .await
        .expect("get")
        .expect("local");
    assert_eq!(local.photo_status, Some(PhotoStatus::Pending));

    app.state.engine.sync_now().await.expect("sync completion");
    let photos = app.state.engine.process_photos().await.expect("upload photos");
    assert_eq!(photos.succeeded, 1);

    let remote = app.backend.daily_chore(&chore_id).await.expect("remote");
    assert!(remote.is_completed);
    assert_eq!(remote.completed_by.as_deref(), Some("Ana"));
    assert_eq!(remote.photo_status, Some(PhotoStatus::Uploaded));
    assert!(remote.thumbnail_storage_id.is_some());

    let local = app
        .state
        .daily_chore_service
        .get(&chore_id)
        .await
        .expect("get")
        .expect("local");
    assert_eq!(local.photo_status, Some(PhotoStatus::Uploaded));
    assert_eq!(local.photo_storage_id, remote.photo_storage_id);
    assert!(app.state.photos.list().await.expect("queue").is_empty());

    let storage_id =
        StorageId::new(local.photo_storage_id.expect("storage id")).expect("storage id");
    for _ in 0..2 {
        let image = app
            .state
            .load_photo(&storage_id)
            .await
            .expect("load photo")
            .expect("photo exists");
        assert_eq!(image.blob, (0..128).collect::<Vec<u8>>());
        assert_eq!(image.mime_type, "image/jpeg");
    }
    assert_eq!(app.backend.calls(BackendOp::DownloadBlob).await, 1);
}

#[tokio::test]
async fn photo_for_unsynced_ad_hoc_chore_waits_for_the_create() {
    let app = memory_app().await;
    let date = app.state.daily_chore_service.today();
    let chore = app
        .state
        .daily_chore_service
        .add_ad_hoc(
            &date,
            NewAdHocChore {
                text: "Patch the coop roof".into(),
                time_slot: TimeSlot::Afternoon,
                animal_category: String::new(),
                created_by: Some("Ana".into()),
            },
        )
        .await
        .expect("add ad hoc");
    let entry = app
        .state
        .daily_chore_service
        .complete_with_photo(&chore.id, captured_photo(&chore.id))
        .await
        .expect("complete with photo");

    // Photos drain independently of mutations; the chore is not on the server yet.
    let early = app.state.engine.process_photos().await.expect("early upload");
    assert_eq!(early.succeeded, 0);
    let queued = app
        .state
        .photos
        .get(&entry.id)
        .await
        .expect("get")
        .expect("still queued");
    assert_eq!(queued.upload_status, UploadStatus::Pending);
    assert_eq!(queued.retry_count, 1);

    app.state.engine.sync_now().await.expect("sync create");
    assert!(app.backend.daily_chore(&chore.id).await.is_some());

    app.clock.advance(60_000);
    let retried = app.state.engine.process_photos().await.expect("retry upload");
    assert_eq!(retried.succeeded, 1);
    let remote = app.backend.daily_chore(&chore.id).await.expect("remote");
    assert_eq!(remote.photo_status, Some(PhotoStatus::Uploaded));
    assert_eq!(remote.animal_category, "General");
}

#[tokio::test]
async fn empty_photo_is_refused_before_any_upload() {
    let app = memory_app().await;
    let date = app.state.daily_chore_service.today();
    let chore_id = id("d-milk");
    app.backend
        .seed_daily_chore(scheduled_chore("d-milk", &date, 10))
        .await;
    app.state
        .hydration
        .pull_daily_chores(&date)
        .await
        .expect("pull daily list");

    let mut photo = captured_photo(&chore_id);
    photo.blob.clear();
    let result = app
        .state
        .daily_chore_service
        .complete_with_photo(&chore_id, photo)
        .await;

    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    app.state.engine.process_photos().await.expect("drain");
    assert_eq!(app.backend.calls(BackendOp::GenerateUploadUrl).await, 0);
    let local = app
        .state
        .daily_chore_service
        .get(&chore_id)
        .await
        .expect("get")
        .expect("local");
    assert!(!local.is_completed);
    assert_eq!(local.photo_status, None);
}

#[tokio::test]
async fn missing_photo_loads_as_none() {
    let app = memory_app().await;
    let storage_id = StorageId::new("kg-unknown".into()).expect("storage id");

    let image = app.state.load_photo(&storage_id).await.expect("load photo");

    assert!(image.is_none());
    assert_eq!(app.state.image_cache.total_size().await.expect("size"), 0);
}
